//! Game client log file transport.
//!
//! Polls a text log for appended lines. Only lines written after
//! [`connect`](super::Transport::connect) are emitted.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bridge::HubHandle;
use crate::common::error::{TransportError, TransportResult};
use crate::common::{Event, TransportId};
use crate::config::types::{parse_duration, EqLogConfig};

use super::Transport;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Read position within the tailed file.
#[derive(Debug, Default)]
struct TailCursor {
    offset: u64,
    /// Bytes of a line that has not been terminated yet.
    partial: Vec<u8>,
}

impl TailCursor {
    async fn at_end(path: &Path) -> std::io::Result<Self> {
        let offset = tokio::fs::metadata(path).await?.len();
        Ok(Self {
            offset,
            partial: Vec::new(),
        })
    }

    /// Read everything appended since the last call and return the
    /// completed lines.
    async fn read_new(&mut self, path: &Path) -> std::io::Result<Vec<String>> {
        let len = tokio::fs::metadata(path).await?.len();
        if len < self.offset {
            debug!("Log file truncated, rewinding");
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut chunk = Vec::new();
        let read = file.read_to_end(&mut chunk).await?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }
}

pub struct EqLogTransport {
    path: PathBuf,
    poll_interval: Duration,
    hub: HubHandle,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl EqLogTransport {
    pub fn new(config: &EqLogConfig, hub: HubHandle, shutdown_rx: watch::Receiver<bool>) -> Self {
        let poll_interval = config
            .poll_interval
            .as_deref()
            .and_then(parse_duration)
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        Self {
            path: PathBuf::from(&config.path),
            poll_interval,
            hub,
            connected: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            shutdown_rx,
        }
    }
}

#[async_trait]
impl Transport for EqLogTransport {
    fn id(&self) -> TransportId {
        TransportId::EqLog
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> TransportResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        let cursor = TailCursor::at_end(&self.path)
            .await
            .map_err(|e| TransportError::ConnectFailed {
                transport: TransportId::EqLog.to_string(),
                message: format!("{}: {}", self.path.display(), e),
            })?;
        info!("Tailing {} from byte {}", self.path.display(), cursor.offset);

        self.connected.store(true, Ordering::SeqCst);
        let task = tokio::spawn(run_tail(
            self.path.clone(),
            cursor,
            self.poll_interval,
            self.hub.clone(),
            self.connected.clone(),
            self.shutdown_rx.clone(),
        ));
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, _event: &Event) -> TransportResult<()> {
        Err(TransportError::SendFailed {
            transport: TransportId::EqLog.to_string(),
            message: "log file transport is read-only".to_string(),
        })
    }
}

async fn run_tail(
    path: PathBuf,
    mut cursor: TailCursor,
    poll_interval: Duration,
    hub: HubHandle,
    connected: Arc<AtomicBool>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cursor.read_new(&path).await {
                    Ok(lines) => {
                        for line in lines {
                            hub.publish(Event::line(TransportId::EqLog, line));
                        }
                    }
                    Err(e) => {
                        warn!(transport = "eqlog", "Failed to read {}: {}", path.display(), e);
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
}
