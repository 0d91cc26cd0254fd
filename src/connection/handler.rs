//! Per-client connection loop.
//!
//! ```text
//! accept ─> read into buffer ─> parse all complete commands ─> execute each
//!              ▲                                                  │
//!              └──────────────── write batched replies ◄──────────┘
//! ```
//!
//! Replies for every command found in one read are encoded into a single
//! output buffer and flushed together, so pipelined clients get one write
//! per batch.

use crate::commands::{command_name, CommandHandler};
use crate::protocol::{ParseError, RequestParser, RespValue, MAX_BULK_SIZE};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

/// A full-size paste plus its command framing must fit.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters shared by all connections.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    #[error("connection closed with {0} unparsed bytes")]
    UnexpectedEof(usize),

    #[error("request exceeds {} bytes", MAX_BUFFER_SIZE)]
    BufferFull,
}

/// State of one client connection.
pub struct ConnectionHandler {
    stream: TcpStream,
    addr: SocketAddr,
    input: BytesMut,
    output: BytesMut,
    parser: RequestParser,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();

        Self {
            stream,
            addr,
            input: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            output: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RequestParser::new(),
            commands,
            stats,
        }
    }

    /// Serves the client until it disconnects, sends QUIT, or misbehaves.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.serve().await;
        self.stats.closed();

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed"),
        }

        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let quit = match self.drain_commands() {
                Ok(quit) => quit,
                Err(e) => {
                    // Tell the client why before hanging up
                    self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
                    RespValue::error(format!("ERR {}", e)).encode(&mut self.output);
                    self.flush().await?;
                    return Err(e.into());
                }
            };

            self.flush().await?;
            if quit {
                return Ok(());
            }

            if !self.fill().await? {
                return if self.input.is_empty() {
                    Ok(())
                } else {
                    Err(ConnectionError::UnexpectedEof(self.input.len()))
                };
            }
        }
    }

    /// Executes every complete command in the input buffer.
    ///
    /// Returns `true` once a QUIT has been answered.
    fn drain_commands(&mut self) -> Result<bool, ParseError> {
        while let Some((args, consumed)) = self.parser.parse(&self.input)? {
            let _ = self.input.split_to(consumed);

            let reply = self.commands.execute(&args);
            reply.encode(&mut self.output);
            self.stats.commands_processed.fetch_add(1, Ordering::Relaxed);
            trace!(client = %self.addr, consumed, "Executed command");

            if command_name(&args).as_deref() == Some("QUIT") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Reads more bytes. Returns `false` on EOF.
    async fn fill(&mut self) -> Result<bool, ConnectionError> {
        if self.input.len() >= MAX_BUFFER_SIZE {
            return Err(ConnectionError::BufferFull);
        }

        self.input.reserve(INITIAL_BUFFER_SIZE);
        let n = self.stream.read_buf(&mut self.input).await?;
        self.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);

        Ok(n > 0)
    }

    async fn flush(&mut self) -> Result<(), ConnectionError> {
        if self.output.is_empty() {
            return Ok(());
        }

        let out = self.output.split();
        self.stream.write_all(&out).await?;
        self.stats
            .bytes_written
            .fetch_add(out.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Runs a connection to completion. Errors are already logged by the handler.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let _ = ConnectionHandler::new(stream, addr, commands, stats)
        .run()
        .await;
}
