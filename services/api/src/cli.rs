use crate::import::{run_check, run_import, ImportArgs, ImportTarget};
use crate::server;
use clap::{Args, Parser, Subcommand};
use waitlist::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "waitlist-api",
    about = "Run the waitlist sign-up API and its storage utilities",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Connect to the document store and report its status
    Check,
    /// Write job or resume documents from a JSON file
    Import {
        #[command(subcommand)]
        command: ImportCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ImportCommand {
    /// Bulk insert job listings (unordered; duplicates do not stop the batch)
    Jobs(ImportArgs),
    /// Insert resume documents one at a time
    Resumes(ImportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Keep documents in process memory instead of MongoDB
    #[arg(long)]
    pub(crate) in_memory: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Check => run_check().await,
        Command::Import {
            command: ImportCommand::Jobs(args),
        } => run_import(ImportTarget::Jobs, args).await,
        Command::Import {
            command: ImportCommand::Resumes(args),
        } => run_import(ImportTarget::Resumes, args).await,
    }
}
