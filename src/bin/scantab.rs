use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use scantab::app::App;
use scantab::error::ScantabError;
use scantab::export::{default_file_name, write_csv};
use scantab::flywheel::FlywheelHttpClient;
use scantab::progress::{BarProgress, ProgressSink, SilentProgress};

#[derive(Parser)]
#[command(name = "scantab")]
#[command(about = "Tabulate NIfTI scan metadata from a Flywheel project into a CSV")]
#[command(version, author)]
struct Cli {
    /// Project label on Flywheel
    #[arg(short, long)]
    project: String,

    /// Output directory, created if absent
    #[arg(short, long, default_value = ".")]
    dest: Utf8PathBuf,

    /// Output file name; defaults to one derived from the project label and
    /// the covered date range
    #[arg(short, long)]
    output: Option<String>,

    /// Only tabulate files created on or after this date, using one
    /// server-side query instead of a full traversal
    #[arg(long, value_name = "YYYY-MM-DD")]
    since: Option<NaiveDate>,

    /// Disable the progress display
    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ScantabError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ScantabError) -> u8 {
    match error {
        ScantabError::Authentication(_)
        | ScantabError::ProjectNotFound(_)
        | ScantabError::NoResults(_) => 2,
        ScantabError::Http(_) | ScantabError::Status { .. } => 3,
        ScantabError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = FlywheelHttpClient::new().into_diagnostic()?;
    let app = App::new(client);
    let project = app.lookup_project(&cli.project).into_diagnostic()?;

    println!(
        "Gathering metadata from Flywheel project {}...",
        project.label
    );
    let table = match cli.since {
        Some(since) => app.scan_since(&project, since).into_diagnostic()?,
        None => {
            let sink: Box<dyn ProgressSink> = if cli.non_interactive {
                Box::new(SilentProgress)
            } else {
                Box::new(BarProgress::new())
            };
            app.scan_project(&project, sink.as_ref()).into_diagnostic()?
        }
    };

    let file_name = cli
        .output
        .unwrap_or_else(|| default_file_name(&project.label, cli.since));
    let path = write_csv(&table, &cli.dest, &file_name).into_diagnostic()?;
    println!("Wrote {} records to {path}", table.len());
    Ok(())
}
