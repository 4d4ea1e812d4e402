//! Deskbridge CLI entry point.

use clap::Parser;

use deskbridge::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve(args) => deskbridge::cli::commands::serve::execute(args, config).await,
        Commands::Tools(args) => {
            deskbridge::cli::commands::tools::execute(args, config, cli.json).await
        }
    };

    if let Err(err) = result {
        deskbridge::cli::handle_error(err, cli.json);
    }
}
