use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser as ClapParser, Subcommand};
use color_eyre::eyre::{bail, Result, WrapErr};
use tracing::debug;

use navsplit::compare::Comparison;
use navsplit::config::{Config, OutputFormat};
use navsplit::ingest::{LogDirectory, LogFile, RunSource};
use navsplit::{logging, report};

#[derive(ClapParser, Debug)]
#[command(name = "navsplit", about = "Compare navigation and work phases of agent sessions")]
struct Cli {
    /// Diagnostic verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare a control and a treatment log directory.
    Compare {
        /// Directory of control-condition session logs.
        control: PathBuf,

        /// Directory of treatment-condition session logs.
        treatment: PathBuf,

        /// Print the full structured dump instead of the table.
        #[arg(long)]
        json: bool,

        /// Column heading for the control condition.
        #[arg(long)]
        control_label: Option<String>,

        /// Column heading for the treatment condition.
        #[arg(long)]
        treatment_label: Option<String>,

        /// Extra side-channel log names (without extension) to ignore.
        #[arg(long = "skip")]
        skip: Vec<String>,
    },

    /// Summarize the raw events of one log file or a log directory.
    Parse {
        /// A session log file or a directory of them.
        path: PathBuf,

        /// Print the parsed events as JSON.
        #[arg(long)]
        json: bool,

        /// Extra side-channel log names (without extension) to ignore.
        #[arg(long = "skip")]
        skip: Vec<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let output = match cli.command {
        Command::Compare {
            control,
            treatment,
            json,
            control_label,
            treatment_label,
            skip,
        } => {
            let mut config = Config::default().with_extra_skips(skip);
            if let Some(label) = control_label {
                config.control_label = label;
            }
            if let Some(label) = treatment_label {
                config.treatment_label = label;
            }
            if json {
                config.output = OutputFormat::Json;
            }
            run_compare(&control, &treatment, &config)?
        }
        Command::Parse { path, json, skip } => {
            let config = Config::default().with_extra_skips(skip);
            run_parse(path, json, &config)?
        }
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn run_compare(control: &Path, treatment: &Path, config: &Config) -> Result<String> {
    let comparison = Comparison::from_dirs(control, treatment, &config.discovery)
        .wrap_err("Failed to analyze experiment logs")?;
    Ok(config.formatter().format(&comparison)?)
}

fn run_parse(path: PathBuf, json: bool, config: &Config) -> Result<String> {
    let source: Box<dyn RunSource> = if path.is_file() {
        Box::new(LogFile {
            path: path.clone(),
            name: "single".to_string(),
        })
    } else if path.is_dir() {
        Box::new(LogDirectory::new(&path, config.discovery.clone()))
    } else {
        bail!("{} not found", path.display());
    };
    let runs = source
        .load_runs()
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

    for run in &runs {
        debug!(run = %run.name, kinds = ?report::kind_counts(&run.events), "parsed events");
    }

    if json {
        Ok(report::events_json(&runs)?)
    } else {
        Ok(report::format_event_summary(&runs))
    }
}
