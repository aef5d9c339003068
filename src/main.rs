mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use insight_core::config::{Config, resolve_config_path};

#[derive(Parser)]
#[command(
    name = "insight",
    about = "Ask questions about monetary policy reports, answered from the reports only",
    version
)]
struct Cli {
    /// Configuration file (default: $INSIGHT_CONFIG or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and index every PDF in the documents directory
    Ingest {
        #[arg(long)]
        documents_dir: Option<PathBuf>,
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long)]
        chunk_overlap: Option<usize>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        index_path: Option<PathBuf>,
    },

    /// Answer a single question
    Ask {
        /// The question, in any language the model understands
        question: String,
        #[arg(long)]
        index_path: Option<PathBuf>,
    },

    /// Answer questions read line by line from stdin
    Chat {
        #[arg(long)]
        index_path: Option<PathBuf>,
    },
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_subscriber();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", commands::describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(&resolve_config_path(cli.config.as_deref()))?;

    match cli.command {
        Command::Ingest {
            documents_dir,
            chunk_size,
            chunk_overlap,
            batch_size,
            index_path,
        } => {
            if let Some(dir) = documents_dir {
                config.ingest.documents_dir = dir;
            }
            if let Some(n) = chunk_size {
                config.ingest.chunk_size = n;
            }
            if let Some(n) = chunk_overlap {
                config.ingest.chunk_overlap = n;
            }
            if let Some(n) = batch_size {
                config.ingest.batch_size = n;
            }
            if let Some(path) = index_path {
                config.index.path = path;
            }
            config.validate()?;
            commands::ingest(&config).await
        }
        Command::Ask {
            question,
            index_path,
        } => {
            if let Some(path) = index_path {
                config.index.path = path;
            }
            config.validate()?;
            commands::ask(&config, &question).await
        }
        Command::Chat { index_path } => {
            if let Some(path) = index_path {
                config.index.path = path;
            }
            config.validate()?;
            commands::chat(&config).await
        }
    }
}
