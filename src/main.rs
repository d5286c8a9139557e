use clap::Parser;
use tracing_subscriber::EnvFilter;

use servo_forge::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Setup logging (set RUST_LOG=info or debug); stdout is kept for command output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
