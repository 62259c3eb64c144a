//! Install progress events and background installs
//!
//! The install runs on a tokio task and reports ordered events over an
//! unbounded channel. The only thing flowing back to the task is a
//! cancellation token, checked between steps and between files.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{InstallOptions, InstallOutcome, Installer};
use crate::error::{Result, VpkgError};

/// The four phases of an install, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstallStep {
    Discovery,
    Download,
    Render,
    Install,
}

impl InstallStep {
    pub const ALL: [InstallStep; 4] = [
        InstallStep::Discovery,
        InstallStep::Download,
        InstallStep::Render,
        InstallStep::Install,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            InstallStep::Discovery => "Discovery",
            InstallStep::Download => "Download",
            InstallStep::Render => "Render",
            InstallStep::Install => "Install",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCounter {
    pub processed: usize,
    pub total: usize,
}

/// One progress report
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub step: InstallStep,
    /// Progress within the step, 0.0 to 1.0
    pub fraction: f32,
    pub description: String,
    pub files: Option<FileCounter>,
    /// Set on the last event of a failed install
    pub error: Option<String>,
}

/// Sender side handed to the install algorithm
///
/// A silent `Progress` drops every event; send failures (the receiver
/// went away) are ignored.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    cancel: Option<CancellationToken>,
}

impl Progress {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel(cancel: CancellationToken) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                cancel: Some(cancel),
            },
            rx,
        )
    }

    pub fn report(&self, step: InstallStep, fraction: f32, description: impl Into<String>) {
        self.send(ProgressEvent {
            step,
            fraction: fraction.clamp(0.0, 1.0),
            description: description.into(),
            files: None,
            error: None,
        });
    }

    pub fn files(&self, step: InstallStep, processed: usize, total: usize, description: impl Into<String>) {
        let fraction = if total == 0 {
            1.0
        } else {
            processed as f32 / total as f32
        };
        self.send(ProgressEvent {
            step,
            fraction: fraction.clamp(0.0, 1.0),
            description: description.into(),
            files: Some(FileCounter { processed, total }),
            error: None,
        });
    }

    pub fn fail(&self, step: InstallStep, error: &VpkgError) {
        self.send(ProgressEvent {
            step,
            fraction: 0.0,
            description: format!("{} failed", step.label()),
            files: None,
            error: Some(error.to_string()),
        });
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(VpkgError::Cancelled),
            _ => Ok(()),
        }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// A running background install
pub struct InstallHandle {
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<Result<InstallOutcome>>,
}

impl InstallHandle {
    /// Wait for the install to finish
    pub async fn wait(self) -> Result<InstallOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(VpkgError::Cancelled),
            Err(e) => Err(VpkgError::Config(format!("Install task panicked: {e}"))),
        }
    }
}

/// Run an install on a background task, reporting progress
pub fn spawn_install(installer: Installer, specifier: String, options: InstallOptions) -> InstallHandle {
    let cancel = CancellationToken::new();
    let (progress, events) = Progress::channel(cancel.clone());

    let task = tokio::spawn(async move {
        installer
            .install_with_progress(&specifier, &options, &progress)
            .await
    });

    InstallHandle {
        events,
        cancel,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order() {
        let indexes: Vec<_> = InstallStep::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert!(InstallStep::Discovery < InstallStep::Install);
    }

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (progress, mut rx) = Progress::channel(CancellationToken::new());
        progress.report(InstallStep::Discovery, 0.5, "resolving");
        progress.files(InstallStep::Render, 1, 4, "client.go");
        drop(progress);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.step, InstallStep::Discovery);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.files, Some(FileCounter { processed: 1, total: 4 }));
        assert_eq!(second.fraction, 0.25);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_checkpoint_after_cancel() {
        let token = CancellationToken::new();
        let (progress, _rx) = Progress::channel(token.clone());
        assert!(progress.checkpoint().is_ok());

        token.cancel();
        let err = progress.checkpoint().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Cancelled);
    }

    #[test]
    fn test_silent_progress_never_fails() {
        let progress = Progress::silent();
        progress.report(InstallStep::Install, 2.0, "done");
        assert!(progress.checkpoint().is_ok());
    }
}
