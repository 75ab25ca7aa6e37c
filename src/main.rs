use clap::{Parser, Subcommand};
use book_agent::Result;
use book_agent::commands::{apply_server_overrides, ask, configure, load_config, serve};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "book-agent")]
#[command(about = "Upload a PDF book and ask questions about it")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overriding the config file
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overriding the config file
        #[arg(long)]
        port: Option<u16>,
    },
    /// Index a PDF and answer a single question about it
    Ask {
        /// Path to the PDF
        pdf: PathBuf,
        /// Question to answer
        question: String,
    },
    /// Show or initialise the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a default config.toml if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = load_config(cli.config_dir)?;
            apply_server_overrides(&mut config, host, port);
            serve(&config).await?;
        }
        Commands::Ask { pdf, question } => {
            let config = load_config(cli.config_dir)?;
            let answer = ask(&config, &pdf, &question).await?;
            println!("{answer}");
        }
        Commands::Config { show, init } => {
            configure(cli.config_dir, show, init)?;
        }
    }

    Ok(())
}
