use clap::Parser;
use tripledger::cli::Cli;
use tripledger::log::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = cli.run().await {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}
