use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use georepo::config::{DEFAULT_CONFIG_FILE, Settings};
use georepo::dashboard::{self, ViewRequest};
use georepo::downloader;
use georepo::render::CardView;
use georepo::repository::Repository;
use georepo::submission::{Submission, SubmissionSink};
use std::path::PathBuf;
use std::sync::Arc;

/// Browse, export and extend the geospatial data repository from the terminal
#[derive(Parser)]
#[command(name = "georepo-cli", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List configured categories and the tables the store holds
    Tables,

    /// Show the cards of one table
    Show {
        table: String,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Export the filtered rows of a table
    Export {
        table: String,
        #[command(flatten)]
        filter: FilterArgs,
        /// Output file; stdout when omitted (CSV only)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Write XLSX instead of CSV
        #[arg(long)]
        xlsx: bool,
    },

    /// Append a record to the submission table
    Submit {
        #[arg(long)]
        title: String,
        #[arg(long)]
        link: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long = "type", default_value = "")]
        kind: String,
        #[arg(long, default_value = "")]
        purpose: String,
        #[arg(long, default_value = "")]
        year_month: String,
        /// Target table, overrides the configured submission table
        #[arg(long)]
        table: Option<String>,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Case-insensitive text searched across all fields
    #[arg(short, long)]
    query: Option<String>,
    /// Allowed values of the filter field (repeatable)
    #[arg(short = 't', long = "type")]
    types: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    let repo = Arc::new(Repository::from_settings(&settings)?);

    match cli.command {
        Command::Tables => {
            println!("Categories:");
            for name in &settings.dashboard.categories {
                println!("  {}", name);
            }
            match repo.table_names() {
                Ok(names) => {
                    println!("Tables in store:");
                    for name in names {
                        println!("  {}", name);
                    }
                }
                Err(e) => eprintln!("warning: {}", e),
            }
        }

        Command::Show {
            table,
            filter,
            format,
        } => {
            let request = view_request(table, filter);
            let view = dashboard::build_view(&repo, &settings.dashboard, &request);
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&view)?),
                Format::Text => {
                    if let Some(warning) = &view.warning {
                        eprintln!("warning: {}", warning);
                    }
                    for card in &view.cards {
                        print_card(card);
                    }
                    println!("{} of {} records", view.cards.len(), view.total);
                }
            }
        }

        Command::Export {
            table,
            filter,
            out,
            xlsx,
        } => {
            let request = view_request(table, filter);
            let table = dashboard::filtered_table(&repo, &settings.dashboard, &request)?;
            match (out, xlsx) {
                (Some(path), true) => {
                    std::fs::write(&path, downloader::to_xlsx(&table)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                (Some(path), false) => {
                    std::fs::write(&path, downloader::to_csv(&table)?)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                (None, true) => anyhow::bail!("--xlsx needs --out <file>"),
                (None, false) => print!("{}", downloader::to_csv(&table)?),
            }
        }

        Command::Submit {
            title,
            link,
            description,
            category,
            kind,
            purpose,
            year_month,
            table,
        } => {
            let submission = Submission {
                title,
                description,
                link,
                category,
                kind,
                purpose,
                year_month,
            };
            let table = table.unwrap_or_else(|| settings.dashboard.submission_table.clone());
            let sink = SubmissionSink::new(Arc::clone(&repo));
            sink.submit(&table, &submission)?;
            println!("✓ Submission appended to '{}'", table);
        }
    }

    Ok(())
}

fn view_request(table: String, filter: FilterArgs) -> ViewRequest {
    ViewRequest {
        table,
        query: filter.query,
        selected: filter.types,
    }
}

fn print_card(card: &CardView) {
    println!("### {}", card.title);
    for field in &card.fields {
        println!("{}: {}", field.label, field.value);
    }
    if let Some(link) = &card.link {
        println!("Link: {}", link);
    }
    println!("---");
}
