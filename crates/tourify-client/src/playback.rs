//! Single-playback coordination.
//!
//! Track previews must never overlap. Instead of a module-level "currently
//! playing" global, callers hold a [`PlaybackCoordinator`] and pass clones of
//! it to whatever starts audio.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Something that is playing and can be stopped.
pub trait Playback: Send + Sync {
    fn id(&self) -> &str;

    fn stop(&self);
}

#[derive(Clone, Default)]
pub struct PlaybackCoordinator {
    current: Arc<Mutex<Option<Arc<dyn Playback>>>>,
}

impl PlaybackCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `playback` the current one, stopping whatever played before.
    pub fn play(&self, playback: Arc<dyn Playback>) {
        let previous = self.current.lock().replace(playback.clone());
        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &playback)
        {
            debug!(previous = previous.id(), next = playback.id(), "Stopping previous playback");
            previous.stop();
        }
    }

    /// Stop the current playback, if any.
    pub fn stop(&self) {
        let current = self.current.lock().take();
        if let Some(current) = current {
            current.stop();
        }
    }

    /// Stop only if `id` is still the current playback. Returns whether it was.
    pub fn stop_if(&self, id: &str) -> bool {
        let current = {
            let mut guard = self.current.lock();
            match guard.as_ref() {
                Some(p) if p.id() == id => guard.take(),
                _ => None,
            }
        };
        match current {
            Some(current) => {
                current.stop();
                true
            }
            None => false,
        }
    }

    pub fn current_id(&self) -> Option<String> {
        self.current.lock().as_ref().map(|p| p.id().to_string())
    }
}
