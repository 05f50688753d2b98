//! ncdbookmarks command line. One subcommand per batch job.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ncdbookmarks::app::App;
use ncdbookmarks::managers::batch_orchestrator::{ExportOptions, ExportReport};
use ncdbookmarks::types::errors::SyncError;

#[derive(Parser)]
#[command(name = "ncdbookmarks")]
#[command(version, about = "Move Diigo bookmarks into Nextcloud Bookmarks")]
struct Cli {
    /// Config file (default: config.yaml in the config directory)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export Diigo to the dump CSV, page by page
    Export {
        /// Recreate every exported bookmark in Nextcloud
        #[arg(long)]
        recreate: bool,
        /// Delete each page from Diigo once it is saved
        #[arg(long)]
        delete: bool,
        /// Generate descriptions with Ollama while recreating
        #[arg(long, requires = "recreate")]
        llm: bool,
    },
    /// Export and delete through the documented API (slow)
    ExportSlow,
    /// Make every Diigo bookmark private
    Privatize,
    /// Write a Diigo CSV back to Diigo
    DiigoUpload { path: PathBuf },
    /// Dump Nextcloud bookmarks to the Nextcloud CSV
    NcDump,
    /// Reconcile a Diigo CSV into Nextcloud
    NcUpload {
        path: PathBuf,
        #[arg(long)]
        llm: bool,
    },
    /// Generate missing descriptions for Nextcloud bookmarks
    LlmImprove,
    /// Show row count, kind and columns of a CSV file
    Inspect { path: PathBuf },
    /// Count tags in a CSV file
    Tags {
        path: PathBuf,
        #[arg(long, default_value_t = 50)]
        top: usize,
    },
    /// Search Diigo bookmarks
    Search { what: String },
    /// Create the config file if missing, then show blank credentials
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ncdbookmarks::logging::init(cli.verbose);

    let app = match App::new(cli.config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "could not load configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(&app, cli.cmd) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "job aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(app: &App, cmd: Command) -> Result<(), SyncError> {
    match cmd {
        Command::Export { recreate, delete, llm } => {
            let report = app.export(ExportOptions {
                recreate,
                delete,
                use_llm: llm,
            })?;
            print_export(&report);
        }
        Command::ExportSlow => print_export(&app.export_delete_documented()?),
        Command::Privatize => {
            let report = app.privatize()?;
            println!("{} pages, {} made private, {} failed", report.pages, report.changed, report.failed);
        }
        Command::DiigoUpload { path } => {
            let report = app.upload_to_diigo(&path)?;
            println!("{} written, {} failed", report.written, report.failed);
        }
        Command::NcDump => {
            let total = app.nc_dump()?;
            println!("{} bookmarks written to {}", total, app.settings.nc_dump_path.display());
        }
        Command::NcUpload { path, llm } => print_export(&app.nc_upload(&path, llm)?),
        Command::LlmImprove => {
            let report = app.improve_descriptions()?;
            println!(
                "{} checked, {} generated, {} unreachable, {} failed",
                report.checked, report.generated, report.unreachable, report.failed
            );
        }
        Command::Inspect { path } => {
            let summary = app.inspect(&path)?;
            println!("{}: {} rows ({:?})", path.display(), summary.rows, summary.kind);
            for (column, required) in &summary.columns {
                println!("  {}{}", column, if *required { " *" } else { "" });
            }
            if !summary.missing.is_empty() {
                println!("missing: {}", summary.missing.join(", "));
            }
        }
        Command::Tags { path, top } => {
            for (tag, count) in app.tag_tally(&path)?.into_iter().take(top) {
                println!("{:>6}  {}", count, tag);
            }
        }
        Command::Search { what } => {
            for item in app.search(&what)? {
                println!("{}\t{}", item.url, item.title);
            }
        }
        Command::CheckConfig => {
            if app.init_config()? {
                println!("wrote default config to {}", app.config_path().display());
            } else {
                println!("config: {}", app.config_path().display());
            }
            let missing = app.missing_credentials();
            if missing.is_empty() {
                println!("credentials complete");
            } else {
                println!("blank: {}", missing.join(", "));
            }
        }
    }
    Ok(())
}

fn print_export(report: &ExportReport) {
    println!(
        "{} pages, {} exported, {} created, {} merged, {} skipped, {} failed, {} deleted",
        report.pages,
        report.exported,
        report.created,
        report.merged,
        report.skipped,
        report.failed,
        report.deleted
    );
    for url in &report.undeleted {
        println!("not deleted: {}", url);
    }
}
