mod config;
mod convergence;
mod db;
mod dom;
mod extract;
mod filters;
mod login;
mod merge;
mod model;
mod pipeline;
mod protocol;
mod remote;
mod session;
mod sync;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::{ConfigService, RemoteConfig};
use crate::filters::Filters;
use crate::remote::{RemoteService, RestRemote};
use crate::session::ReplayPage;
use crate::sync::SyncService;

#[derive(Parser)]
#[command(name = "gig_scraper", about = "Seller dashboard gig scraper and sync")]
struct Cli {
    /// JSON file overriding the built-in extraction filters
    #[arg(long, global = true)]
    filters: Option<PathBuf>,

    /// SQLite cache path (default: data/gigs.sqlite)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a saved dashboard snapshot for gig rows
    Scan {
        /// HTML snapshot of the gigs page
        file: PathBuf,
    },
    /// Full pipeline over a snapshot directory: scan, detail walk, sync
    Run {
        /// Directory of saved page snapshots (one .html per URL)
        snapshots: PathBuf,
        /// Max gigs to scrape in detail
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Skip the remote push, cache locally only
        #[arg(long)]
        no_sync: bool,
        /// Dashboard URL the run starts from
        #[arg(long, default_value = pipeline::DEFAULT_GIGS_URL)]
        gigs_url: String,
        /// Owner id stamped on every synced record
        #[arg(short = 'u', long, default_value = "local")]
        user: String,
    },
    /// Dispatch one wire-format request against a snapshot directory
    Handle {
        /// Directory of saved page snapshots
        snapshots: PathBuf,
        /// Request JSON, e.g. '{"type":"CHECK_LOGIN"}'
        request: String,
        /// URL the replay page starts on
        #[arg(long, default_value = pipeline::DEFAULT_GIGS_URL)]
        url: String,
    },
    /// Push the cached batch to the remote store
    Sync {
        #[arg(short = 'u', long, default_value = "local")]
        user: String,
    },
    /// Probe the remote store and show connection state
    Status,
    /// Show or change the remote store configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// List the locally cached gig records
    Cache {
        /// Substring filter on title or url
        #[arg(short, long)]
        filter: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Cache statistics
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the active configuration
    Show,
    /// Store new credentials
    Set { url: String, key: String },
    /// Revert to the built-in default
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let filters = match &cli.filters {
        Some(path) => Filters::from_file(path)?,
        None => Filters::default(),
    };
    let connect = || match &cli.db {
        Some(path) => db::connect_at(path),
        None => db::connect(),
    };

    let result = match cli.command {
        Commands::Scan { file } => {
            let html = std::fs::read_to_string(&file)?;
            let gigs = {
                let doc = scraper::Html::parse_document(&html);
                let mut found = extract::rows::collect_rows(&doc, &filters);
                if found.is_empty() {
                    found = extract::rows::collect_rows_from_links(&doc, &filters);
                }
                found
            };
            if gigs.is_empty() {
                println!("No gig rows found in {}.", file.display());
                return Ok(());
            }
            for (i, gig) in gigs.iter().enumerate() {
                println!("{:>3} | {:<48} | {}", i + 1, truncate(&gig.title, 48), gig.url);
            }
            println!("\n{} gigs", gigs.len());
            Ok(())
        }
        Commands::Run {
            snapshots,
            limit,
            no_sync,
            gigs_url,
            user,
        } => {
            let conn = connect()?;
            db::init_schema(&conn)?;
            let config = ConfigService::open(connect()?)?;
            let remote = RemoteService::new(
                Box::new(RestRemote::new(config.subscribe())),
                config.subscribe(),
            );

            let page = ReplayPage::new(snapshots, &gigs_url);
            let opts = pipeline::PipelineOptions {
                gigs_url,
                progress: true,
                limit,
                ..Default::default()
            };

            if !no_sync {
                remote.check().await;
            }
            let sync = SyncService::new(&conn, &remote, user);
            let outcome =
                pipeline::run(&page, &filters, &opts, (!no_sync).then_some(&sync)).await;

            match outcome.status {
                protocol::ScrapeStatus::LoginRequired => {
                    println!("Not logged in; snapshots show no active session.");
                }
                protocol::ScrapeStatus::Err => {
                    println!(
                        "Scan failed: {}",
                        outcome.error.as_deref().unwrap_or("unknown error")
                    );
                }
                protocol::ScrapeStatus::Ok => {
                    if no_sync {
                        db::save_batch(&conn, &outcome.records)?;
                        println!(
                            "Cached {} records locally (sync skipped).",
                            outcome.records.len()
                        );
                    } else if let Some(report) = outcome.sync {
                        println!(
                            "Cached {} records; {} pushed to remote{}",
                            outcome.records.len(),
                            report.written,
                            report
                                .error
                                .map(|e| format!(" ({e})"))
                                .unwrap_or_default()
                        );
                    }
                }
            }
            Ok(())
        }
        Commands::Handle {
            snapshots,
            request,
            url,
        } => {
            let request: protocol::Request = serde_json::from_str(&request)?;
            let page = ReplayPage::new(snapshots, &url);
            let conn = connect()?;
            db::init_schema(&conn)?;
            let config = ConfigService::open(connect()?)?;
            let remote = RemoteService::new(
                Box::new(RestRemote::new(config.subscribe())),
                config.subscribe(),
            );
            remote.check().await;
            let sync = SyncService::new(&conn, &remote, "local");
            let response = protocol::dispatch(&request, &page, &filters, Some(&sync)).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Sync { user } => {
            let conn = connect()?;
            db::init_schema(&conn)?;
            let records = db::load_batch(&conn)?;
            if records.is_empty() {
                println!("Nothing cached. Run 'run' first.");
                return Ok(());
            }
            let config = ConfigService::open(connect()?)?;
            let remote = RemoteService::new(
                Box::new(RestRemote::new(config.subscribe())),
                config.subscribe(),
            );
            let status = remote.check().await;
            if !status.connected {
                println!(
                    "Remote unreachable: {}",
                    status.error.unwrap_or_else(|| "unknown error".into())
                );
                return Ok(());
            }
            let sync = SyncService::new(&conn, &remote, user);
            let report = sync.sync_gigs(&records).await;
            println!("Pushed {}/{} records.", report.written, records.len());
            Ok(())
        }
        Commands::Status => {
            let config = ConfigService::open(connect()?)?;
            let remote = RemoteService::new(
                Box::new(RestRemote::new(config.subscribe())),
                config.subscribe(),
            );
            let status = remote.check().await;
            println!("Remote:    {}", config.get().url);
            println!(
                "Connected: {}",
                if status.connected { "yes" } else { "no" }
            );
            if let Some(err) = status.error {
                println!("Error:     {err}");
            }
            Ok(())
        }
        Commands::Config { command } => {
            let config = ConfigService::open(connect()?)?;
            match command {
                ConfigCommands::Show => {
                    let cfg = config.get();
                    println!("url: {}", cfg.url);
                    println!("key: {}", mask(&cfg.key));
                }
                ConfigCommands::Set { url, key } => {
                    config.set(RemoteConfig { url, key })?;
                    println!("Configuration updated.");
                }
                ConfigCommands::Clear => {
                    config.set(RemoteConfig::built_in_default())?;
                    println!("Configuration reset to default.");
                }
            }
            Ok(())
        }
        Commands::Cache { filter, limit } => {
            let conn = connect()?;
            db::init_schema(&conn)?;
            let records = db::load_batch(&conn)?;
            let shown: Vec<_> = records
                .iter()
                .filter(|r| match &filter {
                    Some(f) => {
                        let f = f.to_lowercase();
                        r.title.as_deref().unwrap_or("").to_lowercase().contains(&f)
                            || r.url.as_deref().unwrap_or("").to_lowercase().contains(&f)
                    }
                    None => true,
                })
                .take(limit)
                .collect();
            if shown.is_empty() {
                println!("No cached records.");
                return Ok(());
            }
            println!(
                "{:>3} | {:<40} | {:>4} | {:>4} | {:<8}",
                "#", "Title", "Pkgs", "FAQ", "Error"
            );
            println!("{}", "-".repeat(72));
            for (i, r) in shown.iter().enumerate() {
                println!(
                    "{:>3} | {:<40} | {:>4} | {:>4} | {:<8}",
                    i + 1,
                    truncate(r.title.as_deref().unwrap_or("-"), 40),
                    r.pricing_packages.len(),
                    r.description_faq.faq.len(),
                    r.error.as_deref().unwrap_or("-"),
                );
            }
            println!("\n{} of {} cached records", shown.len(), records.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = connect()?;
            db::init_schema(&conn)?;
            let info = db::cache_info(&conn)?;
            let errors = db::load_batch(&conn)?
                .iter()
                .filter(|r| r.error.is_some())
                .count();
            println!("Records:    {}", info.count);
            println!("With error: {}", errors);
            println!(
                "Updated:    {}",
                info.updated_at.as_deref().unwrap_or("never")
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn mask(key: &str) -> String {
    if key.len() <= 8 {
        "*".repeat(key.len())
    } else {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
