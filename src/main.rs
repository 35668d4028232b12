use clap::Parser;
use tracing_subscriber::EnvFilter;

use nestwatch::config::Config;
use nestwatch::daemon;
use nestwatch::error::Result;

#[derive(Parser, Debug)]
#[command(name = "nestwatchd")]
#[command(about = "Nestwatch chat-monitoring API daemon")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "NESTWATCH_CONFIG")]
    config: Option<String>,

    #[arg(long, env = "NESTWATCH_TOKEN", default_value = "")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nestwatch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    daemon::run(&cli.host, cli.port, config, &cli.token).await
}
