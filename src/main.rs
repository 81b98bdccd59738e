use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use techsweep::{
    aggregate::{aggregate, AggregateOptions, Aggregation},
    analyzer::{select_analyzer, Backend, CommandAnalyzer, HeaderAnalyzer},
    config::Config,
    orchestrator::{ctrl_c, spawn_exit_on, Orchestrator},
    output::{export, print_summary, ExportFormat},
    targets::read_targets,
    Analyzer,
};
use tracing_subscriber::EnvFilter;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const NO_RESULTS: u8 = 2;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Parser)]
#[command(name = "techsweep")]
#[command(
    author,
    version,
    about = "Run a technology analyzer over a list of URLs and merge the results into one table"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every target in a file and export the merged results
    Scan {
        /// Input file, one target URL per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; the format's extension is appended if missing
        #[arg(short, long, default_value = "TechsweepResults")]
        output: String,

        /// Output format (xlsx, csv, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Analyzer backend
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,

        /// Analyzer command line; the target URL is appended to it
        #[arg(short = 'w', long)]
        command: Option<String>,

        /// Arguments placed after the target URL
        #[arg(short = 'c', long, allow_hyphen_values = true)]
        command_args: Option<String>,

        /// Number of targets analyzed at the same time
        #[arg(short = 'a', long)]
        workers: Option<usize>,

        /// Per-target timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Leave out targets where nothing was detected
        #[arg(long)]
        drop_empty: bool,

        /// Log what the analyzer does
        #[arg(short, long)]
        verbose: bool,
    },

    /// List analyzer backends and whether they can run here
    Backends,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

struct ScanOptions {
    input: PathBuf,
    output: String,
    format: ExportFormat,
    backend: Backend,
    command: String,
    command_args: String,
    workers: usize,
    timeout: Duration,
    keep_empty: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            input,
            output,
            format,
            backend,
            command,
            command_args,
            workers,
            timeout,
            drop_empty,
            verbose,
        } => {
            init_logging(verbose);
            let config = Config::load().unwrap_or_else(|e| {
                eprintln!("Ignoring unreadable config file: {:#}", e);
                Config::default()
            });

            let format_str = format.unwrap_or(config.default_format);
            let options = ScanOptions {
                input,
                output,
                format: format_str
                    .parse::<ExportFormat>()
                    .map_err(|e| anyhow::anyhow!(e))?,
                backend: backend.unwrap_or(config.backend),
                command: command.unwrap_or(config.command),
                command_args: command_args.unwrap_or(config.command_args),
                workers: workers.unwrap_or(config.workers),
                timeout: Duration::from_secs(timeout.unwrap_or(config.timeout_secs)),
                keep_empty: !drop_empty && config.keep_empty,
            };

            run_scan(options).await
        }
        Commands::Backends => {
            init_logging(false);
            list_backends()?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "techsweep=debug" } else { "techsweep=error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_scan(options: ScanOptions) -> Result<u8> {
    let targets = read_targets(&options.input)?;
    println!("Loaded {} targets from {}", targets.len(), options.input.display());

    let analyzer = select_analyzer(options.backend, &options.command, &options.command_args)?;
    println!("Using analyzer: {}", analyzer.name());

    let mut orchestrator = Orchestrator::new(analyzer, options.workers, options.timeout)?;
    if std::io::stderr().is_terminal() {
        orchestrator = orchestrator.with_progress(progress_bar());
    }

    let report = orchestrator.run(targets, ctrl_c()).await;
    // The first Ctrl-C only stops the run; a second one aborts the export.
    spawn_exit_on(ctrl_c(), || {
        eprintln!("Interrupted again, exiting.");
        std::process::exit(exit_codes::INTERRUPTED);
    });

    let aggregation = aggregate(
        &report.outcomes,
        AggregateOptions {
            keep_empty: options.keep_empty,
        },
    );

    print_summary(&report, &aggregation);

    finish(&aggregation, options.format, &options.output)
}

/// Exports `aggregation` and picks the exit code. Nothing is written when
/// there are no usable results.
fn finish(aggregation: &Aggregation, format: ExportFormat, output: &str) -> Result<u8> {
    if aggregation.is_empty() {
        eprintln!("No valid results, quitting.");
        return Ok(exit_codes::NO_RESULTS);
    }

    let path = export(aggregation, format, output)?;
    println!("Results written to: {}", path.display());

    Ok(exit_codes::SUCCESS)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} Analyzing targets... ({eta})")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn list_backends() -> Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Available backends:");
    println!();

    let command = CommandAnalyzer::new(&config.command, &config.command_args)?;
    let headers = HeaderAnalyzer::new()?;
    let backends: [(&str, &dyn Analyzer, String); 2] = [
        ("command", &command, config.command.clone()),
        ("headers", &headers, "Server / X-Powered-By response headers".to_string()),
    ];

    for (id, analyzer, detail) in backends {
        let available = if analyzer.is_available() { "yes" } else { "no" };

        println!("  {:<12} {:<25} [available: {}]", id, analyzer.name(), available);
        println!("  {:<12} Uses: {}", "", detail);
        println!();
    }

    Ok(())
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config()?);
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'techsweep config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
