use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

/// Decides when enough bytes have accumulated to hand one unit to the caller.
///
/// `check` returns the length of the satisfied prefix, or `None` if more
/// bytes are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCondition {
    /// Satisfied once at least this many bytes are buffered; consumes exactly
    /// that many.
    Exact(usize),
    /// Satisfied once the delimiter byte appears; consumes through it.
    Delimiter(u8),
}

impl ReadCondition {
    pub fn check(&self, buffered: &[u8]) -> Option<usize> {
        match *self {
            ReadCondition::Exact(len) => (buffered.len() >= len).then_some(len),
            ReadCondition::Delimiter(delimiter) => buffered
                .iter()
                .position(|&byte| byte == delimiter)
                .map(|index| index + 1),
        }
    }
}

/// One duplex stream endpoint plus its receive accumulation buffer.
///
/// Reads are condition-driven: bytes pile up in the buffer until the caller's
/// [`ReadCondition`] is satisfied, and anything past the boundary stays
/// buffered for the next call. Dropping the connection closes the underlying
/// stream even if [`Connection::close`] was never called.
pub struct Connection<S> {
    stream: S,
    buffer: BytesMut,
    closed: bool,
}

impl<S> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
            closed: false,
        }
    }
}

impl<S: AsyncRead + Unpin> Connection<S> {
    /// Reads until `condition` is satisfied and returns exactly the satisfied
    /// prefix. Unconsumed bytes remain buffered.
    ///
    /// EOF before satisfaction surfaces as [`io::ErrorKind::UnexpectedEof`].
    /// Cancel-safe: a cancelled call leaves all accumulated bytes in the
    /// buffer, so the next call picks up where it left off.
    pub async fn read_until(&mut self, condition: ReadCondition) -> io::Result<Bytes> {
        loop {
            if let Some(len) = condition.check(&self.buffer) {
                return Ok(self.buffer.split_to(len).freeze());
            }

            let read = self.stream.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed before read condition was satisfied",
                ));
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> Connection<S> {
    /// Writes the whole payload, flushing so peers see it promptly.
    pub async fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        self.stream.write_all(payload).await?;
        self.stream.flush().await
    }

    /// Shuts the stream down. Idempotent; teardown failures are logged and
    /// swallowed rather than escalated.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(error) = self.stream.shutdown().await {
            warn!(?error, "failed to shut down connection cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn exact_condition_waits_for_enough_bytes() {
        let condition = ReadCondition::Exact(4);
        assert_eq!(condition.check(b"abc"), None);
        assert_eq!(condition.check(b"abcd"), Some(4));
        assert_eq!(condition.check(b"abcdef"), Some(4));
    }

    #[test]
    fn exact_condition_is_satisfied_by_zero_bytes() {
        assert_eq!(ReadCondition::Exact(0).check(b""), Some(0));
    }

    #[test]
    fn delimiter_condition_consumes_through_the_delimiter() {
        let condition = ReadCondition::Delimiter(b'\n');
        assert_eq!(condition.check(b"no newline yet"), None);
        assert_eq!(condition.check(b"line\nrest"), Some(5));
    }

    #[tokio::test]
    async fn read_until_spans_multiple_transport_chunks() {
        // A tiny duplex buffer forces the write to land in several chunks.
        let (mut writer, reader) = tokio::io::duplex(4);
        let mut connection = Connection::new(reader);

        let payload = b"a dozen bytes!".to_vec();
        let expected = payload.clone();
        let write_task = tokio::spawn(async move {
            writer.write_all(&payload).await.expect("write payload");
            writer
        });

        let bytes = connection
            .read_until(ReadCondition::Exact(expected.len()))
            .await
            .expect("read exact");
        assert_eq!(&bytes[..], &expected[..]);

        write_task.await.expect("writer task");
    }

    #[tokio::test]
    async fn read_until_leaves_the_remainder_buffered() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut connection = Connection::new(reader);

        writer.write_all(b"first\nsecond\n").await.expect("write");

        let first = connection
            .read_until(ReadCondition::Delimiter(b'\n'))
            .await
            .expect("first line");
        assert_eq!(&first[..], b"first\n");

        let second = connection
            .read_until(ReadCondition::Delimiter(b'\n'))
            .await
            .expect("second line");
        assert_eq!(&second[..], b"second\n");
    }

    #[tokio::test]
    async fn eof_mid_read_is_an_error() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let mut connection = Connection::new(reader);

        writer.write_all(b"abc").await.expect("write");
        writer.shutdown().await.expect("shutdown");
        drop(writer);

        let error = connection
            .read_until(ReadCondition::Exact(8))
            .await
            .expect_err("read should fail at eof");
        assert_eq!(error.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (writer, _reader) = tokio::io::duplex(16);
        let mut connection = Connection::new(writer);
        connection.close().await;
        connection.close().await;
    }
}
