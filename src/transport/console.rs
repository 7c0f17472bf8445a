//! Game server console (telnet) transport.
//!
//! A line-oriented TCP session. Inbound lines go through the
//! [`ConsoleIngest`] pipeline; outbound events are written as console
//! commands.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::{debug, info, warn};

use crate::bridge::ConsoleIngest;
use crate::common::error::{TransportError, TransportResult};
use crate::common::{Event, TransportId};
use crate::config::types::TelnetConfig;
use crate::presence::PresenceStore;

use super::Transport;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_LINE_LENGTH: usize = 8192;
/// Time the console gets to answer `who` before the count is read.
const WHO_SETTLE: Duration = Duration::from_millis(100);

/// Newline-delimited console framing.
///
/// Lines are decoded lossily: bytes that are not UTF-8 become U+FFFD
/// instead of failing the stream. Lines longer than the maximum are
/// dropped whole.
#[derive(Debug)]
pub struct ConsoleCodec {
    max_length: usize,
    /// Bytes already searched for a newline.
    next_index: usize,
    /// Set while skipping the rest of an overlong line.
    discarding: bool,
}

impl ConsoleCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Default for ConsoleCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

impl Decoder for ConsoleCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if self.discarding || src.len() > self.max_length {
                    if !self.discarding {
                        warn!(transport = "telnet", "Dropping console line over {} bytes", self.max_length);
                    }
                    self.discarding = true;
                    src.clear();
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let raw = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() > self.max_length + 1 {
                warn!(transport = "telnet", "Dropping console line over {} bytes", self.max_length);
                continue;
            }
            return Ok(Some(decode_line(&raw)));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() || self.discarding {
            src.clear();
            self.discarding = false;
            return Ok(None);
        }
        let raw = src.split_to(src.len());
        Ok(Some(decode_line(&raw)))
    }
}

impl<T: AsRef<str>> Encoder<T> for ConsoleCodec {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Game server console transport.
pub struct ConsoleTransport {
    config: TelnetConfig,
    ingest: Arc<Mutex<ConsoleIngest>>,
    store: Arc<PresenceStore>,
    connected: Arc<AtomicBool>,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    session: Mutex<Option<JoinHandle<()>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConsoleTransport {
    pub fn new(
        config: TelnetConfig,
        ingest: ConsoleIngest,
        store: Arc<PresenceStore>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            ingest: Arc::new(Mutex::new(ingest)),
            store,
            connected: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(None),
            session: Mutex::new(None),
            shutdown_rx,
        }
    }

    fn write_line(&self, line: String) -> TransportResult<()> {
        let writer = self.writer.lock();
        let Some(tx) = writer.as_ref().filter(|_| self.is_connected()) else {
            return Err(TransportError::NotConnected {
                transport: TransportId::Telnet.to_string(),
            });
        };
        tx.send(line).map_err(|_| TransportError::NotConnected {
            transport: TransportId::Telnet.to_string(),
        })
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn id(&self) -> TransportId {
        TransportId::Telnet
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> TransportResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        info!("Connecting to console at {}", self.config.host);

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.config.host))
            .await
            .map_err(|_| TransportError::ConnectFailed {
                transport: TransportId::Telnet.to_string(),
                message: format!("timed out after {}s", CONNECT_TIMEOUT.as_secs()),
            })?
            .map_err(|e| TransportError::ConnectFailed {
                transport: TransportId::Telnet.to_string(),
                message: e.to_string(),
            })?;

        let mut framed = Framed::new(stream, ConsoleCodec::new());
        if !self.config.username.is_empty() {
            login(&mut framed, &self.config.username, &self.config.password).await?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.writer.lock() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        self.ingest.lock().on_connect();

        let handle = tokio::spawn(run_session(
            framed,
            rx,
            self.ingest.clone(),
            self.connected.clone(),
            self.shutdown_rx.clone(),
        ));
        if let Some(previous) = self.session.lock().replace(handle) {
            previous.abort();
        }
        info!("Console connected");
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        // Dropping the writer ends the session loop, which runs its own cleanup.
        self.writer.lock().take();
        let session = self.session.lock().take();
        if let Some(session) = session {
            if let Err(e) = session.await {
                debug!("Console session ended abnormally: {}", e);
            }
        }
        Ok(())
    }

    async fn send(&self, event: &Event) -> TransportResult<()> {
        let line = event.message.replace(['\r', '\n'], " ");
        self.write_line(line)
    }

    async fn probe_online(&self) -> Option<TransportResult<usize>> {
        if let Err(e) = self.write_line("who".to_string()) {
            return Some(Err(e));
        }
        tokio::time::sleep(WHO_SETTLE).await;
        Some(Ok(self.store.online_count()))
    }
}

async fn login<S>(
    framed: &mut Framed<S, ConsoleCodec>,
    username: &str,
    password: &str,
) -> TransportResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    for line in [username, password] {
        framed
            .send(line)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                transport: TransportId::Telnet.to_string(),
                message: format!("login failed: {}", e),
            })?;
    }
    Ok(())
}

/// Pump one console session until the peer closes, the writer is dropped
/// or shutdown is signalled.
async fn run_session<S>(
    mut framed: Framed<S, ConsoleCodec>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    ingest: Arc<Mutex<ConsoleIngest>>,
    connected: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            line = framed.next() => {
                match line {
                    Some(Ok(line)) => ingest.lock().handle_line(&line),
                    Some(Err(e)) => {
                        warn!(transport = "telnet", "Console read failed: {}", e);
                        break;
                    }
                    None => {
                        info!("Console closed the connection");
                        break;
                    }
                }
            }
            line = outbound.recv() => {
                match line {
                    Some(line) => {
                        if let Err(e) = framed.send(line).await {
                            warn!(transport = "telnet", "Console write failed: {}", e);
                            break;
                        }
                    }
                    None => {
                        debug!("Console writer dropped, closing session");
                        break;
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    ingest.lock().on_disconnect();
}
