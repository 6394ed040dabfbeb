use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::watch;

/// Host-side end of the pause signal. `true` means paused.
#[derive(Clone, Debug)]
pub struct PauseHandle {
    tx: Arc<watch::Sender<bool>>,
}

/// Creates a pause signal starting un-paused.
pub fn pause_channel() -> (PauseHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (PauseHandle { tx: Arc::new(tx) }, rx)
}

impl PauseHandle {
    #[cfg(test)]
    pub fn set(&self, paused: bool) {
        self.tx.send_replace(paused);
    }

    /// Flips the state and returns the new value.
    pub fn toggle(&self) -> bool {
        let mut now = false;
        self.tx.send_modify(|paused| {
            *paused = !*paused;
            now = *paused;
        });
        now
    }

    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Toggles pause on every line read from `input` until EOF. Blocking, so
/// hosts run it on its own thread (stdin reads would otherwise hold up
/// runtime shutdown).
pub fn toggle_on_lines<R: BufRead>(input: R, pause: PauseHandle) {
    for line in input.lines() {
        if let Err(err) = line {
            log::warn!("Reading pause input failed: {}", err);
            break;
        }
        let paused = pause.toggle();
        log::info!("{}", if paused { "Pause requested" } else { "Resume requested" });
    }
}
