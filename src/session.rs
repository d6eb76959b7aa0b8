use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{Connection, ReadCondition};
use crate::frame::{decode_header, Command, FrameHeader, HEADER_LEN};

/// Display name a session carries until a `name` command arrives.
pub const DEFAULT_NAME: &str = "<unknown>";

/// One decoded frame, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub payload: Bytes,
}

/// One client's connection plus its chat state.
///
/// A session alternates between awaiting a header and awaiting a payload;
/// the `pending` slot records a header whose payload has not arrived yet, so
/// a decode cycle cancelled between the two reads resumes where it stopped.
pub struct Session<S> {
    connection: Connection<S>,
    name: String,
    pending: Option<FrameHeader>,
}

impl<S> Session<S> {
    pub fn new(connection: Connection<S>) -> Self {
        Self {
            connection,
            name: DEFAULT_NAME.to_string(),
            pending: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

impl<S: AsyncRead + Unpin> Session<S> {
    /// Runs one decode cycle: header, then payload if the header announced
    /// one. Returns exactly one message or the error that ended the read.
    ///
    /// Cancel-safe: safe to race in a `select!` against broadcast delivery.
    pub async fn read_message(&mut self) -> io::Result<Message> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => {
                let bytes = self
                    .connection
                    .read_until(ReadCondition::Exact(HEADER_LEN))
                    .await?;
                decode_header(&bytes)
                    .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?
            }
        };

        if header.payload_len == 0 {
            return Ok(Message {
                command: Command::from_tag(header.tag),
                payload: Bytes::new(),
            });
        }

        // Park the header before awaiting the payload; if the await is
        // cancelled, the next call resumes with the same header.
        self.pending = Some(header);
        let payload = self
            .connection
            .read_until(ReadCondition::Exact(header.payload_len as usize))
            .await?;
        self.pending = None;

        Ok(Message {
            command: Command::from_tag(header.tag),
            payload,
        })
    }
}

impl<S: AsyncWrite + Unpin> Session<S> {
    /// Writes one broadcast line to this session's peer. Failures here end
    /// only this session; the broadcaster never hears about them.
    pub async fn write_message(&mut self, payload: &[u8]) -> io::Result<()> {
        self.connection.write(payload).await
    }

    pub async fn close(&mut self) {
        self.connection.close().await;
    }
}
