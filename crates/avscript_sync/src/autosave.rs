//! Debounced write-back of the timeline to an external store.
//!
//! One writer task owns the store. Requests coalesce to the latest payload,
//! at most one write is in flight, and consecutive writes are spaced by
//! [`AutosaveConfig::min_interval`]. Writes wait for the [`SaveGate`] to be
//! idle, so nothing is written while a reconcile runs.

use crate::error::{Result, StoreError, SyncError};
use crate::gate::SaveGate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Destination of autosaved payloads.
pub trait ScriptStore<P>: Send + Sync + 'static {
    fn save(&self, payload: P) -> impl Future<Output = std::result::Result<(), StoreError>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutosaveConfig {
    pub min_interval_secs: u64,
    pub quota_retry_secs: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 30,
            quota_retry_secs: 60,
        }
    }
}

impl AutosaveConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn quota_retry_delay(&self) -> Duration {
        Duration::from_secs(self.quota_retry_secs)
    }
}

/// Save indicator published by the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    /// A payload is queued and waiting for its slot.
    Pending,
    Saving,
    Saved,
    /// The store reported a quota error; the write is retried after a delay.
    RetryingAfterQuota,
    Failed(String),
}

/// Cloneable handle for queueing saves from elsewhere.
#[derive(Debug)]
pub struct AutosaveHandle<P> {
    requests: mpsc::UnboundedSender<P>,
}

impl<P> Clone for AutosaveHandle<P> {
    fn clone(&self) -> Self {
        Self {
            requests: self.requests.clone(),
        }
    }
}

impl<P> AutosaveHandle<P> {
    pub fn request(&self, payload: P) -> Result<()> {
        self.requests.send(payload).map_err(|_| SyncError::WriterClosed)
    }
}

pub struct Autosaver<P> {
    handle: AutosaveHandle<P>,
    status: watch::Receiver<SaveStatus>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<P: Clone + Send + 'static> Autosaver<P> {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn<S: ScriptStore<P>>(store: S, gate: SaveGate, config: AutosaveConfig) -> Self {
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SaveStatus::Idle);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let writer = Writer {
            store,
            gate,
            config,
            requests: requests_rx,
            status: status_tx,
            shutdown: shutdown_rx,
            last_write: None,
        };
        let task = tokio::spawn(writer.run());

        Self {
            handle: AutosaveHandle { requests },
            status,
            shutdown,
            task,
        }
    }

    /// Queue `payload`, replacing any payload still waiting.
    pub fn request(&self, payload: P) -> Result<()> {
        self.handle.request(payload)
    }

    pub fn handle(&self) -> AutosaveHandle<P> {
        self.handle.clone()
    }

    pub fn status(&self) -> SaveStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Flush the latest queued payload without waiting out the interval,
    /// then stop the writer.
    pub async fn shutdown(self) -> Result<SaveStatus> {
        let _ = self.shutdown.send(true);
        self.task.await.map_err(|e| SyncError::WriterFailed(e.to_string()))?;
        let status = self.status.borrow().clone();
        Ok(status)
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

struct Writer<P, S> {
    store: S,
    gate: SaveGate,
    config: AutosaveConfig,
    requests: mpsc::UnboundedReceiver<P>,
    status: watch::Sender<SaveStatus>,
    shutdown: watch::Receiver<bool>,
    last_write: Option<Instant>,
}

impl<P: Clone + Send + 'static, S: ScriptStore<P>> Writer<P, S> {
    async fn run(mut self) {
        while let Some(payload) = self.next_request().await {
            self.status.send_replace(SaveStatus::Pending);
            self.wait_for_slot().await;
            let payload = self.coalesce(payload);
            self.write(payload).await;
        }
        tracing::debug!("Autosave writer stopped");
    }

    async fn next_request(&mut self) -> Option<P> {
        if self.is_closing() {
            return self.requests.try_recv().ok();
        }
        tokio::select! {
            biased;
            payload = self.requests.recv() => payload,
            _ = closed(&mut self.shutdown) => self.requests.try_recv().ok(),
        }
    }

    /// Sleep until `min_interval` has passed since the last write.
    async fn wait_for_slot(&mut self) {
        let Some(last) = self.last_write else { return };
        if self.is_closing() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep_until(last + self.config.min_interval()) => {}
            _ = closed(&mut self.shutdown) => {}
        }
    }

    fn coalesce(&mut self, mut payload: P) -> P {
        let mut dropped = 0usize;
        while let Ok(next) = self.requests.try_recv() {
            payload = next;
            dropped += 1;
        }
        if dropped > 0 {
            tracing::debug!(dropped, "Coalesced queued saves");
        }
        payload
    }

    async fn write(&mut self, mut payload: P) {
        loop {
            let result = {
                let _guard = self.gate.begin_save().await;
                self.status.send_replace(SaveStatus::Saving);
                self.store.save(payload.clone()).await
            };
            self.last_write = Some(Instant::now());

            match result {
                Ok(()) => {
                    tracing::info!("Autosaved");
                    self.status.send_replace(SaveStatus::Saved);
                    return;
                }
                Err(StoreError::QuotaExceeded) if !self.is_closing() => {
                    let delay = self.config.quota_retry_delay();
                    tracing::warn!(retry_in_secs = delay.as_secs(), "Write quota exceeded, retrying");
                    self.status.send_replace(SaveStatus::RetryingAfterQuota);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = closed(&mut self.shutdown) => {}
                    }
                    payload = self.coalesce(payload);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Autosave failed");
                    self.status.send_replace(SaveStatus::Failed(e.to_string()));
                    return;
                }
            }
        }
    }

    /// Shutdown was requested or the [`Autosaver`] is gone.
    fn is_closing(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }
}

/// Resolves once shutdown was requested or the [`Autosaver`] was dropped.
async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
