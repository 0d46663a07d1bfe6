//! Background snapshot writer.
//!
//! [`WriteScheduler`] is a cheap handle to a tokio task that owns the
//! snapshot file. Scheduled snapshots are coalesced: the task waits one
//! write window after the first submission, then writes only the latest.
//! A flush writes whatever is pending immediately and reports the result.
//! Every write outcome is published on a [`watch`] channel.
//!
//! # Command flow
//!
//! ```text
//! schedule(snapshot) --> [pending = snapshot, arm window]
//!                              |
//!                 window elapses | flush() | shutdown()
//!                              v
//!                spawn_blocking(SnapshotFile::write)
//!                              |
//!                 watch: Written { at } / Failed { message }
//! ```

use std::time::Duration;

use imperion_core::{PersistError, SnapshotSink};
use imperion_types::{PersistentSnapshot, now_ms};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::error::DbError;
use crate::snapshot_file::SnapshotFile;

/// Last observed state of the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    /// Nothing has been scheduled yet.
    Idle,
    /// A snapshot is waiting for its write window.
    Pending,
    /// The latest write succeeded.
    Written {
        /// Completion time in epoch milliseconds.
        at: i64,
    },
    /// The latest write failed. The snapshot is retried on the next flush
    /// or schedule.
    Failed {
        /// Rendered error.
        message: String,
    },
}

enum Command {
    Schedule(PersistentSnapshot),
    Flush(oneshot::Sender<Result<(), DbError>>),
    Shutdown(oneshot::Sender<Result<(), DbError>>),
}

/// Handle to the background writer. Clones share the same task.
#[derive(Debug, Clone)]
pub struct WriteScheduler {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<WriteStatus>,
}

impl WriteScheduler {
    /// Start the writer task for `file`, coalescing over `window`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(file: SnapshotFile, window: Duration) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(WriteStatus::Idle);
        info!(path = %file.path().display(), window_ms = window.as_millis(), "Write scheduler started");
        let task = tokio::spawn(run(file, window, receiver, status_tx));
        (Self { commands, status }, task)
    }

    /// Queue `snapshot`, replacing any snapshot still waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SchedulerClosed`] if the task has stopped.
    pub fn schedule(&self, snapshot: PersistentSnapshot) -> Result<(), DbError> {
        self.commands
            .send(Command::Schedule(snapshot))
            .map_err(|_closed| DbError::SchedulerClosed)
    }

    /// Write any pending snapshot now and wait for the result.
    ///
    /// # Errors
    ///
    /// Returns the write error, or [`DbError::SchedulerClosed`] if the task
    /// has stopped.
    pub async fn flush(&self) -> Result<(), DbError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Flush(reply))
            .map_err(|_closed| DbError::SchedulerClosed)?;
        response.await.map_err(|_closed| DbError::SchedulerClosed)?
    }

    /// Watch write outcomes.
    pub fn status(&self) -> watch::Receiver<WriteStatus> {
        self.status.clone()
    }

    /// Flush and stop the task. Later calls on any handle fail with
    /// [`DbError::SchedulerClosed`].
    ///
    /// # Errors
    ///
    /// Returns the final write error, or [`DbError::SchedulerClosed`] if
    /// the task had already stopped.
    pub async fn shutdown(&self) -> Result<(), DbError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(reply))
            .map_err(|_closed| DbError::SchedulerClosed)?;
        response.await.map_err(|_closed| DbError::SchedulerClosed)?
    }
}

impl SnapshotSink for WriteScheduler {
    fn submit(&mut self, snapshot: PersistentSnapshot) -> Result<(), PersistError> {
        self.schedule(snapshot).map_err(PersistError::from)
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

async fn run(
    file: SnapshotFile,
    window: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<WriteStatus>,
) {
    let mut pending: Option<PersistentSnapshot> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let command = match deadline {
            Some(at) => {
                tokio::select! {
                    command = commands.recv() => command,
                    () = tokio::time::sleep_until(at) => {
                        deadline = None;
                        // Failures are published on the status channel.
                        let _ = write_pending(&file, &mut pending, &status).await;
                        continue;
                    }
                }
            }
            None => commands.recv().await,
        };

        match command {
            Some(Command::Schedule(snapshot)) => {
                pending = Some(snapshot);
                if deadline.is_none() {
                    let now = Instant::now();
                    deadline = Some(now.checked_add(window).unwrap_or(now));
                }
                status.send_replace(WriteStatus::Pending);
            }
            Some(Command::Flush(reply)) => {
                deadline = None;
                let result = write_pending(&file, &mut pending, &status).await;
                let _ = reply.send(result);
            }
            Some(Command::Shutdown(reply)) => {
                commands.close();
                let result = write_pending(&file, &mut pending, &status).await;
                info!(path = %file.path().display(), "Write scheduler stopped");
                let _ = reply.send(result);
                break;
            }
            None => {
                let _ = write_pending(&file, &mut pending, &status).await;
                debug!("All scheduler handles dropped");
                break;
            }
        }
    }
}

/// Write the pending snapshot, if any, on the blocking pool. A snapshot
/// that fails to write stays pending.
async fn write_pending(
    file: &SnapshotFile,
    pending: &mut Option<PersistentSnapshot>,
    status: &watch::Sender<WriteStatus>,
) -> Result<(), DbError> {
    let Some(snapshot) = pending.take() else {
        return Ok(());
    };

    let target = file.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let result = target.write(&snapshot);
        (snapshot, result)
    })
    .await;

    let result = match joined {
        Ok((_, Ok(()))) => Ok(()),
        Ok((snapshot, Err(err))) => {
            *pending = Some(snapshot);
            Err(err)
        }
        Err(err) => Err(DbError::Task(err.to_string())),
    };

    match &result {
        Ok(()) => {
            status.send_replace(WriteStatus::Written { at: now_ms() });
        }
        Err(err) => {
            error!(path = %file.path().display(), error = %err, "Snapshot write failed");
            status.send_replace(WriteStatus::Failed {
                message: err.to_string(),
            });
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(last_save: i64) -> PersistentSnapshot {
        PersistentSnapshot {
            last_save,
            ..PersistentSnapshot::default()
        }
    }

    #[tokio::test]
    async fn flush_writes_only_the_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state.json"));
        let (scheduler, _task) = WriteScheduler::spawn(file.clone(), Duration::from_secs(60));

        scheduler.schedule(snapshot(1)).unwrap();
        scheduler.schedule(snapshot(2)).unwrap();
        assert!(file.read().is_none());

        scheduler.flush().await.unwrap();
        assert_eq!(file.read().map(|s| s.last_save), Some(2));
        assert!(matches!(*scheduler.status().borrow(), WriteStatus::Written { .. }));
    }

    #[tokio::test]
    async fn window_elapses_into_a_write() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state.json"));
        let (scheduler, _task) = WriteScheduler::spawn(file.clone(), Duration::from_millis(10));

        let mut status = scheduler.status();
        scheduler.schedule(snapshot(7)).unwrap();
        status
            .wait_for(|s| matches!(s, WriteStatus::Written { .. }))
            .await
            .unwrap();
        assert_eq!(file.read().map(|s| s.last_save), Some(7));
    }

    #[tokio::test]
    async fn shutdown_flushes_then_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state.json"));
        let (scheduler, task) = WriteScheduler::spawn(file.clone(), Duration::from_secs(60));

        scheduler.schedule(snapshot(3)).unwrap();
        scheduler.shutdown().await.unwrap();
        task.await.unwrap();

        assert_eq!(file.read().map(|s| s.last_save), Some(3));
        assert!(matches!(scheduler.schedule(snapshot(4)), Err(DbError::SchedulerClosed)));
        assert!(matches!(scheduler.flush().await, Err(DbError::SchedulerClosed)));
    }

    #[tokio::test]
    async fn failed_write_is_reported_and_retained() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file.
        let blocked = dir.path().join("occupied");
        std::fs::create_dir(&blocked).unwrap();
        let (scheduler, _task) =
            WriteScheduler::spawn(SnapshotFile::new(&blocked), Duration::from_secs(60));

        scheduler.schedule(snapshot(5)).unwrap();
        assert!(scheduler.flush().await.is_err());
        assert!(matches!(*scheduler.status().borrow(), WriteStatus::Failed { .. }));

        // Still pending, so a second flush tries again.
        assert!(scheduler.flush().await.is_err());
    }
}
