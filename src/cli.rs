use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand};

/// Well-known chat relay port; clients must use the same one.
pub const CHAT_PORT: u16 = 8888;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the chat room, accepting TCP connections.
    Serve(ServeArgs),
    /// Connect to a room and participate in the chat.
    Connect(ConnectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address the room should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:8888")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Host name or address of the room.
    pub host: String,

    /// Port the room is listening on.
    #[arg(long, default_value_t = CHAT_PORT)]
    pub port: u16,
}
