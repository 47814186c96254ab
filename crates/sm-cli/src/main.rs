//! snowmock CLI - run Snowflake-dialect SQL against the in-process emulator

use clap::Parser;

mod cli;
mod commands;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.global.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    let _ = logger.try_init();

    let result = match &cli.command {
        cli::Commands::Run(args) => commands::run(args, &cli.global),
        cli::Commands::Serve(args) => commands::serve(args, &cli.global).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
