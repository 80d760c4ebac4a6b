mod common;

use georepo::{RepoError, Value};
use georepo::render;
use georepo::submission::{SUBMISSION_HEADER, Submission, SubmissionSink};
use std::sync::Arc;
use std::thread;

use common::*;

fn suggestion(title: &str, link: &str) -> Submission {
    Submission {
        title: title.to_string(),
        link: link.to_string(),
        description: "Suggested through the form".to_string(),
        kind: "Raster Data".to_string(),
        ..Default::default()
    }
}

#[test]
fn empty_link_is_rejected_and_nothing_written() {
    let dir = csv_fixture();
    let repo = csv_repo(dir.path());
    let sink = SubmissionSink::new(Arc::clone(&repo));
    let path = dir.path().join("Data Sources.csv");
    let before = std::fs::read_to_string(&path).unwrap();

    let result = sink.submit("Data Sources", &suggestion("Landsat 9", ""));
    assert!(matches!(result, Err(RepoError::ValidationFailed(_))));

    let result = sink.submit("Data Sources", &suggestion("   ", "https://landsat.gsfc.nasa.gov"));
    assert!(matches!(result, Err(RepoError::ValidationFailed(_))));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    println!("✓ invalid submissions left the table unchanged");
}

#[test]
fn accepted_submission_is_last_row_after_reload() {
    let dir = csv_fixture();
    let repo = csv_repo(dir.path());
    let sink = SubmissionSink::new(Arc::clone(&repo));

    // Warm the cache so the submission has to invalidate it
    assert_eq!(repo.load("Data Sources").unwrap().len(), 3);

    sink.submit(
        "Data Sources",
        &suggestion("Landsat 9", "https://landsat.gsfc.nasa.gov"),
    )
    .unwrap();

    let table = repo.load("Data Sources").unwrap();
    assert_eq!(table.len(), 4);
    let last = table.rows().last().unwrap();
    let card = render::render(last);
    assert_eq!(card.title, "Landsat 9");
    assert_eq!(card.link.as_deref(), Some("https://landsat.gsfc.nasa.gov"));
    assert_eq!(last.get("Type").unwrap().to_string(), "Raster Data");

    // Earlier rows keep their order
    assert_eq!(render::render(&table.rows()[0]).title, "Sentinel-2");
}

#[test]
fn missing_table_is_created_with_default_header() {
    let dir = csv_fixture();
    let repo = csv_repo(dir.path());
    let sink = SubmissionSink::new(Arc::clone(&repo));

    sink.submit("Suggestions", &suggestion("Copernicus DEM", "https://dataspace.copernicus.eu"))
        .unwrap();

    let table = repo.load("Suggestions").unwrap();
    assert_eq!(table.header(), SUBMISSION_HEADER);
    assert_eq!(table.len(), 1);
    assert_eq!(render::render(&table.rows()[0]).title, "Copernicus DEM");
}

#[test]
fn concurrent_submissions_are_all_persisted() {
    let dir = csv_fixture();
    let repo = csv_repo(dir.path());
    let sink = Arc::new(SubmissionSink::new(Arc::clone(&repo)));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let s = suggestion(&format!("Dataset {}", i), &format!("https://example.org/{}", i));
                sink.submit("Tools", &s)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let table = repo.load("Tools").unwrap();
    // Two original tools plus eight submissions
    assert_eq!(table.len(), 10);
    for i in 0..8 {
        let title = format!("Dataset {}", i);
        assert!(
            table.rows().iter().any(|r| render::render(r).title == title),
            "missing {}",
            title
        );
    }
    println!("✓ all 8 concurrent submissions persisted");
}

#[test]
fn workbook_submission_keeps_other_sheets() {
    let (_dir, path) = workbook_fixture();
    let repo = workbook_repo(&path);
    let sink = SubmissionSink::new(Arc::clone(&repo));

    sink.submit("Tools", &suggestion("GRASS GIS", "https://grass.osgeo.org"))
        .unwrap();
    sink.submit("Suggestions", &suggestion("Landsat 9", "https://landsat.gsfc.nasa.gov"))
        .unwrap();

    let tools = repo.load("Tools").unwrap();
    let titles: Vec<String> = tools.rows().iter().map(|r| render::render(r).title).collect();
    assert_eq!(titles, vec!["QGIS", "GRASS GIS"]);
    assert_eq!(
        render::render(&tools.rows()[1]).link.as_deref(),
        Some("https://grass.osgeo.org")
    );

    let sources = repo.load("Data Sources").unwrap();
    assert_eq!(sources.len(), 2);

    let suggestions = repo.load("Suggestions").unwrap();
    assert_eq!(suggestions.len(), 1);
}

#[test]
fn workbook_rewrite_keeps_date_cells() {
    let (_dir, path) = workbook_fixture();
    let repo = workbook_repo(&path);

    let before = repo.load("Data Sources").unwrap();
    let cell = before.rows()[0].get("Year/Month of Data Availability").unwrap().clone();
    assert!(matches!(cell, Value::DateTime(_)), "read as {:?}", cell);
    assert_eq!(cell.to_string(), "2013-04-01");

    let sink = SubmissionSink::new(Arc::clone(&repo));
    sink.submit("Tools", &suggestion("GRASS GIS", "https://grass.osgeo.org"))
        .unwrap();

    // Fresh repository so nothing comes from the cache
    let reread = workbook_repo(&path).load("Data Sources").unwrap();
    let after = reread.rows()[0].get("Year/Month of Data Availability").unwrap();
    assert_eq!(after, &cell);

    let card = render::render(&reread.rows()[0]);
    let year_month = card.fields.iter().find(|f| f.label == "Year/Month").unwrap();
    assert_eq!(year_month.value, "2013-04-01");
    println!("✓ date cell survived the workbook rewrite");
}

#[test]
fn table_led_by_other_column_accepts_submission() {
    let dir = csv_fixture();
    write_table(dir.path(), "Courses", "Category,Title,Link\nGIS,Intro to QGIS,https://qgis.org/learn\n");
    let repo = csv_repo(dir.path());
    let sink = SubmissionSink::new(Arc::clone(&repo));

    sink.submit("Courses", &suggestion("Remote Sensing 101", "https://example.org/rs101"))
        .unwrap();

    let table = repo.load("Courses").unwrap();
    assert_eq!(table.len(), 2);
    let card = render::render(&table.rows()[1]);
    assert_eq!(card.title, "Remote Sensing 101");
    assert_eq!(card.href.as_deref(), Some("https://example.org/rs101"));
}
