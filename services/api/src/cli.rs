use crate::check::{run_check, run_validate, CheckArgs, DataArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use karma_rewards::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Karma Rewards",
    about = "Serve and exercise the daily surprise box reward engine",
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
    /// Decide a single user/day from the command line and print the response JSON
    Check(CheckArgs),
    /// Load and validate the reward data files without serving
    Validate(DataArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    #[command(flatten)]
    pub(crate) data: DataArgs,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Check(args) => run_check(args).await,
        Command::Validate(args) => run_validate(args),
    }
}
