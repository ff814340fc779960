use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::interfaces::cli::{self, Cli};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() {
    init_tracing();
    let args = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::execute(args)) {
        error!(error = %err, "Command failed");
        eprintln!("{}", err.message());
        std::process::exit(1);
    }
}
