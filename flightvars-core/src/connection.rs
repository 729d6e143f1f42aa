use crate::Result;
use bytes::BytesMut;
use flightvars_codec::{DecodeError, Message};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// A protocol connection over a TCP stream. Reads are buffered so a
/// partially received message waits for more bytes instead of failing.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single message from the stream.
    ///
    /// Returns `None` when the peer closed the connection on a message
    /// boundary. A connection closed in the middle of a message is an error.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        loop {
            match Message::parse(&mut self.buffer) {
                Ok(message) => return Ok(Some(message)),
                Err(DecodeError::Incomplete) => {}
                Err(e) => return Err(e.into()),
            }

            // Not enough buffered data for a whole message. Attempt to read
            // more from the socket; `0` indicates end of stream.
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err("connection reset by peer".into())
                };
            }
        }
    }

    pub async fn write_message(&mut self, message: &Message) -> io::Result<()> {
        let mut buf = BytesMut::with_capacity(1024);
        message.to_buf(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await
    }
}
