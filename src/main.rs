mod cli;
mod listener;
mod logging;
mod resolver;
mod session;
mod transport;

use anyhow::Context;
use cli::UsageError;
use listener::Listener;
use std::process;
use std::sync::Arc;
use tcp_relay_shared::limits;
use transport::TcpDialer;

use tracing::{debug, info};

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("tcp-relay").to_string();

    let args = match cli::parse_from(&argv) {
        Ok(args) => args,
        Err(UsageError) => {
            println!("{}", cli::usage(&program));
            process::exit(limits::EXIT_USAGE);
        }
    };

    logging::init();
    info!(args = ?&argv[1..], "invoked");

    if let Err(e) = run(args).await {
        println!("{:#}", e);
        process::exit(limits::EXIT_FATAL);
    }
}

/// Resolve, bind and serve forever; only setup failures return
async fn run(args: cli::Args) -> anyhow::Result<()> {
    let config = args.into_config()?;
    let local = resolver::resolve_local(&config)
        .await
        .context("Error in resolve local")?;
    let remote = resolver::resolve_remote(&config).await;
    debug!(%remote, "remote endpoint");

    let listener = Listener::bind(local).await.context("Error in listen")?;
    info!(listen = %listener.local_addr()?, remote = %remote, "listening");

    let dialer = Arc::new(TcpDialer::new(remote));
    listener.run(dialer).await;
    Ok(())
}
