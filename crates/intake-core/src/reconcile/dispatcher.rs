//! Background mirror dispatcher.
//!
//! A single thread owns the outbox drain loop. Commits signal it through a
//! channel; it wakes, flushes everything queued, and goes back to waiting.
//! Dropping the handle closes the channel, which triggers one final flush
//! before the thread exits.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tracing::{debug, error, warn};

use intake_mirror::ExternalStore;

use crate::db::Database;

use super::{flush, MirrorStatus};

/// Handle to the dispatcher thread. Signals are coalesced: many commits
/// between wakes still cost one drain.
pub struct MirrorHandle {
    signal: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl MirrorHandle {
    /// Start the dispatcher.
    pub fn spawn(db: Arc<Mutex<Database>>, store: Arc<dyn ExternalStore>) -> Self {
        let (signal, wake) = mpsc::channel();
        let join = std::thread::Builder::new()
            .name("mirror-dispatcher".into())
            .spawn(move || run(db, store, wake))
            .expect("failed to spawn mirror dispatcher");
        Self {
            signal: Some(signal),
            join: Some(join),
        }
    }

    /// Tell the dispatcher new work is queued.
    pub fn notify(&self) {
        if let Some(signal) = &self.signal {
            // A closed channel means the thread is gone; nothing to do.
            let _ = signal.send(());
        }
    }
}

impl Drop for MirrorHandle {
    fn drop(&mut self) {
        // Closing the channel ends the loop after a final flush.
        self.signal.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("mirror dispatcher thread panicked");
            }
        }
    }
}

fn run(db: Arc<Mutex<Database>>, store: Arc<dyn ExternalStore>, wake: Receiver<()>) {
    loop {
        let shutting_down = match wake.recv() {
            Ok(()) => {
                // Drain piled-up signals so a burst of commits costs one pass.
                loop {
                    match wake.try_recv() {
                        Ok(()) => continue,
                        Err(TryRecvError::Empty) => break false,
                        Err(TryRecvError::Disconnected) => break true,
                    }
                }
            }
            Err(_) => true,
        };

        match flush(&db, store.as_ref()) {
            Ok(outcomes) => {
                let failed = outcomes
                    .iter()
                    .filter(|o| matches!(o.status, MirrorStatus::Failed { .. }))
                    .count();
                if failed > 0 {
                    warn!(total = outcomes.len(), failed, "mirror pass completed with failures");
                } else if !outcomes.is_empty() {
                    debug!(total = outcomes.len(), "mirror pass completed");
                }
            }
            Err(e) => error!(error = %e, "mirror pass aborted"),
        }

        if shutting_down {
            break;
        }
    }
}
