//! lexitest CLI: take, simulate, and inspect adaptive vocabulary tests.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lexitest", version, about = "Adaptive vocabulary test engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test interactively
    Run {
        /// Question set file to take offline
        #[arg(long, conflicts_with = "code")]
        set: Option<PathBuf>,

        /// Test code from the server
        #[arg(long)]
        code: Option<String>,

        /// Self-service test type on the server (e.g. "placement")
        #[arg(long, conflicts_with = "code")]
        test_type: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for the session report
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run a scripted answer sequence through the engine
    Simulate {
        /// Question set file
        #[arg(long)]
        set: PathBuf,

        /// Comma-separated answers: c = correct, w = wrong, optional seconds (e.g. "c2,c0.8,w5")
        #[arg(long)]
        answers: String,

        /// Save the session report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate question set TOML files
    Validate {
        /// Path to question set file or directory
        #[arg(long)]
        set: PathBuf,
    },

    /// Show a saved session report
    Report {
        /// Report JSON file
        #[arg(long)]
        path: PathBuf,

        /// Output format: text, markdown, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Create starter config and example question set
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexitest=info".parse().expect("static directive")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            set,
            code,
            test_type,
            config,
            output,
        } => commands::run::execute(set, code, test_type, config, output).await,
        Commands::Simulate {
            set,
            answers,
            output,
        } => commands::simulate::execute(set, answers, output).await,
        Commands::Validate { set } => commands::validate::execute(set),
        Commands::Report { path, format } => commands::report::execute(path, format),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
