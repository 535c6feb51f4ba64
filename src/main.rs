mod catalog;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mcp::{Relay, RelayConfig, Server, ServerConfig, WebSocketTransport, DEFAULT_PORT};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Gangway - MCP protocol engine with a stdio to WebSocket relay
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose output
    #[clap(short, long)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the demonstration MCP server on a WebSocket listener
    Serve {
        /// Address to bind
        #[clap(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on
        #[clap(long, default_value_t = DEFAULT_PORT, env = "GANGWAY_PORT")]
        port: u16,
    },
    /// Bridge stdin/stdout to a remote MCP server
    Relay {
        /// Remote host
        #[clap(default_value = "localhost")]
        host: String,

        /// Remote port
        #[clap(default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Diagnostics go to stderr; stdout is reserved for relayed traffic
    let filter = if args.verbose {
        "gangway=debug,gangway_mcp=debug,info"
    } else {
        "gangway=info,gangway_mcp=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Commands::Serve { bind, port } => serve(&bind, port).await,
        Commands::Relay { host, port } => relay(host, port).await,
    }
}

async fn serve(bind: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((bind, port)).await?;
    info!(bind = bind, port = port, "listening for connections");

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                info!("interrupt received");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                info!(peer = %peer, "client connected");
                tokio::spawn(async move {
                    match WebSocketTransport::accept(stream).await {
                        Ok(transport) => {
                            let config = ServerConfig {
                                instructions: Some(
                                    "Demonstration server with a calculator tool, sample \
                                     resources, and sample prompts."
                                        .to_string(),
                                ),
                                ..ServerConfig::default()
                            };
                            let server =
                                Server::new(Arc::new(transport), config, catalog::routes());
                            if let Err(e) = server.start().await {
                                error!(error = %e, "failed to start session");
                                return;
                            }
                            server.join().await;
                            info!(peer = %peer, "session ended");
                        }
                        Err(e) => error!(error = %e, "websocket handshake failed"),
                    }
                });
            }
        }
    }
}

async fn relay(host: String, port: u16) -> Result<()> {
    let config = RelayConfig { host, port };

    // A connect or handshake failure here is fatal and exits non-zero;
    // anything after this point shuts down gracefully
    let relay = Relay::connect(&config).await?;
    relay.run().await?;
    Ok(())
}
