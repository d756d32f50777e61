//! lowcode CLI
//!
//! Commands:
//! - `lowcode lowcode:build` - Build the view/meta UMD bundles and manifests
//! - `lowcode lowcode:dev` - Serve in-memory dev bundles and rebuild on change

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lowcode_bundler::{run_build, run_dev, BuildArgs, Command, DevArgs};

#[derive(Parser)]
#[command(name = "lowcode")]
#[command(author, version, about = "Build tool for low-code component packages", long_about = None)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// Build mode (default: production for build, development for dev)
    #[arg(long, global = true)]
    mode: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = Command::Build.name(), about = Command::Build.description())]
    Build {
        /// Empty the output directory first
        #[arg(long)]
        clean: bool,

        /// Do not print the stats table
        #[arg(long)]
        silent: bool,
    },

    #[command(name = Command::Dev.name(), about = Command::Dev.description())]
    Dev {
        /// Dev server host
        #[arg(long)]
        host: Option<String>,

        /// Dev server port
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lowcode_bundler=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Build { clean, silent } => {
            let args = BuildArgs {
                clean,
                silent,
                mode: cli
                    .mode
                    .unwrap_or_else(|| Command::Build.default_mode().to_string()),
            };
            run_build(&root, &args).await?;
        }
        Commands::Dev { host, port } => {
            let args = DevArgs {
                host,
                port,
                mode: cli
                    .mode
                    .unwrap_or_else(|| Command::Dev.default_mode().to_string()),
            };
            run_dev(&root, &args).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
