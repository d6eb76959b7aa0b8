use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{lookup_host, TcpStream},
    select,
};
use tracing::{info, warn};

use crate::cli::ConnectArgs;
use crate::connection::{Connection, ReadCondition};
use crate::frame::{encode_frame, TAG_LEN};

/// Marker that makes a typed line an explicit command instead of chat text.
const ESCAPE: char = '\\';

/// Connects to a room and runs until the server closes the connection or
/// local input ends.
///
/// Two activities proceed concurrently without blocking each other: decoding
/// newline-delimited broadcasts from the room, and turning typed lines into
/// frames. Stdin is serviced on the runtime's blocking pool, so the event
/// loop stays free while a line is being typed.
pub async fn run(args: ConnectArgs) -> Result<()> {
    let stream = establish_connection(&args).await?;
    let mut connection = Connection::new(stream);
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        select! {
            line = connection.read_until(ReadCondition::Delimiter(b'\n')) => {
                match line {
                    Ok(bytes) => print_broadcast(&bytes).await?,
                    Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => {
                        info!("server closed the connection");
                        break;
                    }
                    Err(error) => return Err(error).context("reading from the room"),
                }
            }
            typed = input.next_line() => {
                match typed.context("reading local input")? {
                    Some(text) => {
                        if let Some(frame) = frame_for_input(&text) {
                            connection.write(&frame).await.context("sending to the room")?;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    connection.close().await;
    Ok(())
}

/// Resolves host and port to candidate endpoints and connects to the first
/// one that answers.
async fn establish_connection(args: &ConnectArgs) -> Result<TcpStream> {
    let target = format!("{}:{}", args.host, args.port);
    let candidates = lookup_host(&target)
        .await
        .with_context(|| format!("failed to resolve {target}"))?;

    let mut last_error = None;
    for addr in candidates {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!("connected to {addr}");
                return Ok(stream);
            }
            Err(error) => {
                warn!(%addr, ?error, "candidate endpoint did not answer");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) => Err(error).context(format!("failed to connect to {target}")),
        None => bail!("{target} resolved to no addresses"),
    }
}

async fn print_broadcast(line: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line).await?;
    stdout.flush().await?;
    Ok(())
}

/// Turns one typed line into a frame.
///
/// A line starting with the escape marker is `\<4-char-command>[<sp><data>]`
/// with data defaulting to empty; anything else non-empty is an implicit
/// `chat` with the whole line as payload. Returns `None` for lines that
/// should not be sent.
fn frame_for_input(line: &str) -> Option<Bytes> {
    let Some(rest) = line.strip_prefix(ESCAPE) else {
        if line.is_empty() {
            return None;
        }
        return Some(encode_frame(*b"chat", line.as_bytes()));
    };

    let (command, data) = match rest.split_once(' ') {
        Some((command, data)) => (command, data),
        None => (rest, ""),
    };

    let tag: [u8; TAG_LEN] = match command.as_bytes().try_into() {
        Ok(tag) => tag,
        Err(_) => {
            warn!(command, "commands must be exactly four characters");
            return None;
        }
    };

    Some(encode_frame(tag, data.as_bytes()))
}
