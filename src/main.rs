//! Folio CLI entry point.

use clap::Parser;

use folio::cli::{handle_error, Cli, Commands};
use folio::infrastructure::logging::{LogConfig, LoggerImpl};
use folio::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => folio::cli::commands::init::execute(args, cli.json).await,
        Commands::Portfolio(args) => folio::cli::commands::portfolio::execute(args, &config, cli.json).await,
        Commands::Block(args) => folio::cli::commands::block::execute(args, &config, cli.json).await,
        Commands::Verify(args) => folio::cli::commands::verify::execute(args, &config, cli.json).await,
        Commands::Evidence(args) => folio::cli::commands::evidence::execute(args, &config, cli.json).await,
        Commands::Student(args) => folio::cli::commands::student::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
