use clap::Parser;
use weekmix_cli::{Cli, run};
use weekmix_core::{LoggingDestination, Verbosity, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbosity = Verbosity::from_flag(cli.verbose);
    if let Err(err) = init_logging(LoggingDestination::FileAndStderr, verbosity) {
        eprintln!("Warning: structured logging unavailable: {err}");
    }

    let mut stdout = std::io::stdout();
    if let Err(err) = run(cli, &mut stdout).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
