//! Session event loop
//!
//! A single task owns the [`EditorSession`]. Edits and finished uploads
//! arrive on an mpsc channel and are applied in order; between events the
//! loop sleeps until the coordinator's debounce deadline and then runs the
//! validation pass. Each pass result is published on a `watch` channel for
//! the run-import trigger.

use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::EditorSession;
use crate::checksum::Checksum;
use crate::config::IngestConfig;
use crate::error::{MapperError, Result};
use crate::source::{ingest_file, DataSource};

/// A queued edit, applied on the session task
pub type Edit = Box<dyn FnOnce(&mut EditorSession) -> Result<()> + Send>;

/// Events that can reach the session task
pub enum SessionEvent {
    /// Apply an edit to the session
    Edit(Edit),
    /// An upload finished reading its preview
    SourceReady(DataSource),
    /// An upload could not be read
    SourceFailed { path: PathBuf, error: MapperError },
    /// Stop the loop and hand the session back
    Shutdown,
}

impl SessionEvent {
    pub fn edit<F>(edit: F) -> Self
    where
        F: FnOnce(&mut EditorSession) -> Result<()> + Send + 'static,
    {
        Self::Edit(Box::new(edit))
    }
}

/// What the run-import trigger sees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidityStatus {
    pub valid: bool,
    /// Passes run so far
    pub passes: u64,
    /// Fingerprint of the last exported schema
    pub fingerprint: Option<Checksum>,
}

impl ValidityStatus {
    fn of(session: &EditorSession) -> Self {
        Self {
            valid: session.is_valid(),
            passes: session.passes(),
            fingerprint: session.schema().map(|s| s.fingerprint.clone()),
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run the session until `Shutdown` arrives or every sender is dropped
pub async fn drive(
    mut session: EditorSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    status: watch::Sender<ValidityStatus>,
) -> EditorSession {
    loop {
        let deadline = session.deadline().map(Instant::from_std);

        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(SessionEvent::Edit(edit)) => {
                        if let Err(err) = edit(&mut session) {
                            warn!(error = %err, "edit rejected");
                        }
                    }
                    Some(SessionEvent::SourceReady(source)) => {
                        if let Err(err) = session.add_data_source(source) {
                            warn!(error = %err, "data source rejected");
                        }
                    }
                    Some(SessionEvent::SourceFailed { path, error }) => {
                        warn!(path = %path.display(), %error, "upload failed");
                    }
                    Some(SessionEvent::Shutdown) | None => break,
                }
            }
            _ = until(deadline) => {
                match session.poll() {
                    Ok(Some(_)) => {
                        status.send_replace(ValidityStatus::of(&session));
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "validation pass failed"),
                }
            }
        }
    }
    debug!(passes = session.passes(), "session loop stopped");
    session
}

/// Read a file's preview in the background and post the result to the session
pub fn spawn_ingest(
    path: PathBuf,
    config: IngestConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match ingest_file(&path, &config).await {
            Ok(source) => SessionEvent::SourceReady(source),
            Err(error) => SessionEvent::SourceFailed { path, error },
        };
        if events.send(event).is_err() {
            debug!("session closed before upload finished");
        }
    })
}
