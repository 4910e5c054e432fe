//! Track previews played by an external program.

use parking_lot::Mutex;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tourify_client::Playback;
use tracing::{debug, warn};

use crate::config::PlayerSettings;
use crate::error::{CliError, Result};

/// A running player process. Stopping it kills the process.
pub struct ProcessPlayback {
    id: String,
    child: Mutex<Option<Child>>,
}

impl ProcessPlayback {
    pub fn spawn(settings: &PlayerSettings, id: impl Into<String>, url: &str) -> Result<Self> {
        let id = id.into();
        let child = Command::new(&settings.command)
            .args(&settings.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CliError::config(format!(
                    "failed to start player '{}': {e}",
                    settings.command
                ))
            })?;
        debug!(track = %id, pid = ?child.id(), "Started preview");
        Ok(Self {
            id,
            child: Mutex::new(Some(child)),
        })
    }

    /// Whether the process has ended or was stopped.
    pub fn has_exited(&self) -> bool {
        match self.child.lock().as_mut() {
            Some(child) => !matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }
}

impl Playback for ProcessPlayback {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        if let Some(mut child) = self.child.lock().take() {
            debug!(track = %self.id, "Stopping preview");
            if let Err(e) = child.start_kill() {
                warn!(track = %self.id, error = %e, "Failed to stop player");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tourify_client::PlaybackCoordinator;

    fn sleeper() -> PlayerSettings {
        PlayerSettings {
            command: "sleep".into(),
            args: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_second_preview_stops_first() {
        let coordinator = PlaybackCoordinator::new();
        let first = Arc::new(ProcessPlayback::spawn(&sleeper(), "1", "30").unwrap());
        let second = Arc::new(ProcessPlayback::spawn(&sleeper(), "2", "30").unwrap());

        coordinator.play(first.clone());
        assert!(!first.has_exited());

        coordinator.play(second.clone());
        assert!(first.has_exited());
        assert!(!second.has_exited());
        assert_eq!(coordinator.current_id().as_deref(), Some("2"));

        coordinator.stop();
        assert!(second.has_exited());
    }

    #[tokio::test]
    async fn test_missing_player_is_a_config_error() {
        let settings = PlayerSettings {
            command: "tourify-no-such-player".into(),
            args: Vec::new(),
        };
        assert!(matches!(
            ProcessPlayback::spawn(&settings, "1", "x"),
            Err(CliError::Config(_))
        ));
    }
}
