//! JSON-lines audit log of membership events.
//!
//! Every event published on the bus is appended as one JSON object per line,
//! e.g. `{"type":"memberAdded","observer":"1:0","member":"2:0","tick":5}`.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use membership_core::{EventBus, MembershipEvent, Subscription};
use tracing::warn;

/// Appends membership events to a file for as long as it is held.
pub struct AuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
    _subscription: Subscription,
}

impl AuditLog {
    /// Open `path` for appending and subscribe to `events`.
    pub fn open(path: &Path, events: &Arc<EventBus>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create audit log directory: {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open audit log: {:?}", path))?;

        let writer = Arc::new(Mutex::new(BufWriter::new(file)));
        let sink = Arc::clone(&writer);
        let subscription = events.subscribe(move |event| {
            if let Err(e) = append(&sink, &event) {
                warn!("Failed to write audit event: {}", e);
            }
        });

        tracing::info!("Writing audit log to {:?}", path);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            _subscription: subscription,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered lines to disk.
    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .flush()
            .context("Failed to flush audit log")
    }
}

fn append(writer: &Mutex<BufWriter<File>>, event: &MembershipEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let mut writer = writer.lock().unwrap_or_else(|e| e.into_inner());
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
}

/// Read an audit log back as events' raw JSON values.
pub fn read_events(path: &Path) -> Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read audit log: {:?}", path))?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("Malformed audit log line"))
        .collect()
}
