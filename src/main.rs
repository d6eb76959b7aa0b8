use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chat_relay::{
    cli::{Cli, Command},
    client, room,
};

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            let listener = TcpListener::bind(args.listen)
                .await
                .with_context(|| format!("failed to bind {}", args.listen))?;
            let room = room::Room::new(listener);
            let addr = room.local_addr()?;
            info!("room listening on {}", addr);
            if let Err(err) = room.run_until_ctrl_c().await {
                warn!("room exited with error: {err:?}");
                return Err(err);
            }
        }
        Command::Connect(args) => client::run(args).await?,
    }

    Ok(())
}
