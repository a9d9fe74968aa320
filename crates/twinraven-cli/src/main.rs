use clap::Parser;
use twinraven::Cli;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = twinraven::run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
