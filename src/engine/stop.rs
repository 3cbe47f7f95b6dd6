//! Cooperative stop flag shared with the Ctrl+C handler

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Raised once to ask the engine to stop between samples
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raise this signal on Ctrl+C.
    pub fn install_ctrlc(&self) -> Result<(), ctrlc::Error> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Ctrl+C received, stopping");
            signal.raise();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_raised());

        handle.raise();
        assert!(signal.is_raised());
    }
}
