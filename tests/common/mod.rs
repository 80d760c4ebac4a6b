#![allow(dead_code)]

use georepo::Repository;
use georepo::loader::{CsvDirStore, WorkbookStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const DATA_SOURCES_CSV: &str = "\
Data Source,Description,Type,Spatial Resolution (in m),Version,Purpose,Links
Sentinel-2,Multispectral imagery,Raster Data,10,L2A,Land cover mapping,https://sentinel.esa.int
MODIS Land Surface Temperature,\"Daily LST, 1 km\",Raster Data,1000,6.1,Climate monitoring,https://modis.gsfc.nasa.gov
OpenStreetMap,Crowd-sourced map data,Vector Data,,,Base maps,https://www.openstreetmap.org
";

pub const TOOLS_CSV: &str = "\
Tools,Description,Type,Link
QGIS,Desktop GIS,Desktop,https://qgis.org
,Orphan row without a tool name,Desktop,https://example.org
GDAL,Raster and vector translation library,Library,
";

pub const TUTORIALS_CSV: &str = "\
Tutorials,Description,Link to the codes
Intro to GEE,First steps with Earth Engine,https://example.org/gee
";

/// Temp directory holding one CSV file per table
pub fn csv_fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), "Data Sources", DATA_SOURCES_CSV);
    write_table(dir.path(), "Tools", TOOLS_CSV);
    write_table(dir.path(), "Free Tutorials", TUTORIALS_CSV);
    dir
}

pub fn write_table(dir: &Path, table: &str, contents: &str) {
    std::fs::write(dir.join(format!("{}.csv", table)), contents).unwrap();
}

pub fn csv_repo(dir: &Path) -> Arc<Repository> {
    Arc::new(Repository::new(
        Box::new(CsvDirStore::new(dir)),
        Duration::from_secs(60),
    ))
}

/// Temp directory holding `repository.xlsx` with "Data Sources" and "Tools" sheets
pub fn workbook_fixture() -> (TempDir, std::path::PathBuf) {
    use rust_xlsxwriter::{Format, Workbook};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("repository.xlsx");
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Data Sources").unwrap();
    let header = [
        "Data Source",
        "Type",
        "Spatial Resolution (in m)",
        "Links",
        "Year/Month of Data Availability",
    ];
    for (c, name) in header.iter().enumerate() {
        sheet.write_string(0, c as u16, *name).unwrap();
    }
    sheet.write_string(1, 0, "Landsat 8").unwrap();
    sheet.write_string(1, 1, "Raster Data").unwrap();
    sheet.write_number(1, 2, 30.0).unwrap();
    sheet.write_string(1, 3, "https://landsat.gsfc.nasa.gov").unwrap();
    // 41365 is 2013-04-01
    let month = Format::new().set_num_format("yyyy-mm");
    sheet.write_number_with_format(1, 4, 41365.0, &month).unwrap();
    // Row 3 has no data source and must be dropped
    sheet.write_string(2, 1, "Raster Data").unwrap();
    sheet.write_string(3, 0, "SRTM DEM").unwrap();
    sheet.write_string(3, 1, "Elevation").unwrap();
    sheet.write_number(3, 2, 30.0).unwrap();

    let tools = workbook.add_worksheet();
    tools.set_name("Tools").unwrap();
    tools.write_string(0, 0, "Tools").unwrap();
    tools.write_string(0, 1, "Link").unwrap();
    tools.write_string(1, 0, "QGIS").unwrap();
    tools.write_string(1, 1, "https://qgis.org").unwrap();

    workbook.save(&path).unwrap();
    (dir, path)
}

pub fn workbook_repo(path: &Path) -> Arc<Repository> {
    Arc::new(Repository::new(
        Box::new(WorkbookStore::new(path)),
        Duration::from_secs(60),
    ))
}
