//! Per-connection serve loop: parse commands out of the read buffer,
//! dispatch, write replies.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::Router;
use crate::config::Config;
use crate::resp::{Command, RespParser, RespValue};

/// One client connection: owns the transport, the read buffer, and the
/// buffered writer. Lives exactly as long as its serve loop.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buf: BytesMut,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    idle_timeout: Option<Duration>,
}

impl Connection {
    pub fn new(stream: TcpStream, config: &Config) -> Self {
        Connection {
            stream: BufWriter::with_capacity(config.write_buffer_size, stream),
            buf: BytesMut::with_capacity(config.read_buffer_size),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            idle_timeout: config.idle_timeout(),
        }
    }

    /// Run the command loop until EOF, cancellation, a timeout, or a broken
    /// transport.
    pub async fn serve(
        mut self,
        router: Arc<Router>,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        loop {
            // Drain every complete command already buffered.
            loop {
                match RespParser::parse_command(&mut self.buf) {
                    Ok(Some(cmd)) => {
                        let reply = dispatch_guarded(&router, &cmd);
                        self.write_reply(&reply).await?;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(error = %err, "protocol error");
                        // The offending bytes were not consumed; drop them so
                        // the connection resynchronizes at the next read.
                        self.buf.clear();
                        let frame = RespValue::error(format!("SYNTAX {err}"));
                        self.write_reply(&frame).await?;
                        break;
                    }
                }
            }

            // An empty buffer means the client is between commands, which is
            // the idle case; mid-frame reads fall under the read timeout.
            let limit = if self.buf.is_empty() {
                self.idle_timeout.or(self.read_timeout)
            } else {
                self.read_timeout
            };

            let Connection { stream, buf, .. } = &mut self;
            let read = async {
                match limit {
                    Some(deadline) => match tokio::time::timeout(deadline, stream.read_buf(buf)).await {
                        Ok(result) => result.map(Some),
                        Err(_) => Ok(None),
                    },
                    None => stream.read_buf(buf).await.map(Some),
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                result = read => match result? {
                    Some(0) => return Ok(()),
                    Some(_) => {}
                    None => {
                        debug!("connection timed out");
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn write_reply(&mut self, reply: &RespValue) -> std::io::Result<()> {
        let bytes = reply.serialize();
        let deadline = self.write_timeout;
        let write = async {
            self.stream.write_all(&bytes).await?;
            self.stream.flush().await
        };
        match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, write).await {
                Ok(result) => result,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "write timed out",
                )),
            },
            None => write.await,
        }
    }
}

/// Dispatch with panic containment: a handler that unwinds becomes an
/// INTERNAL reply instead of taking down the connection or the server.
fn dispatch_guarded(router: &Router, cmd: &Command) -> RespValue {
    match catch_unwind(AssertUnwindSafe(|| router.dispatch(cmd))) {
        Ok(reply) => reply,
        Err(_) => {
            warn!(command = cmd.name(), "handler panicked");
            RespValue::error("INTERNAL unexpected error while executing command")
        }
    }
}
