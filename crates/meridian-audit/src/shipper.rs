//! Sinks events leave the bus through. `FileShipper` appends
//! newline-delimited JSON; `StdoutShipper` is for local/dev use;
//! `WebhookShipper` POSTs a JSON batch to a configured URL.

use crate::event::AuditEvent;
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShipError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    BadStatus(u16),
}

#[async_trait]
pub trait Shipper: Send + Sync {
    async fn ship(&self, events: &[AuditEvent]) -> Result<(), ShipError>;
}

pub struct FileShipper {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileShipper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Shipper for FileShipper {
    async fn ship(&self, events: &[AuditEvent]) -> Result<(), ShipError> {
        let _guard = self.lock.lock().expect("file shipper lock poisoned");
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        for event in events {
            let line = serde_json::to_string(event).expect("AuditEvent always serializes");
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}

pub struct StdoutShipper;

#[async_trait]
impl Shipper for StdoutShipper {
    async fn ship(&self, events: &[AuditEvent]) -> Result<(), ShipError> {
        for event in events {
            tracing::info!(target: "audit", event = %serde_json::to_string(event).unwrap_or_default());
        }
        Ok(())
    }
}

pub struct WebhookShipper {
    pub url: String,
    pub client: reqwest::Client,
}

#[async_trait]
impl Shipper for WebhookShipper {
    async fn ship(&self, events: &[AuditEvent]) -> Result<(), ShipError> {
        let response = self.client.post(&self.url).json(events).send().await?;
        if !response.status().is_success() {
            return Err(ShipError::BadStatus(response.status().as_u16()));
        }
        Ok(())
    }
}
