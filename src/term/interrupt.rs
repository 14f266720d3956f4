//! Cooperative stop requests.
//!
//! Host signals and the Ctrl-C key only raise a flag; the run loop checks
//! it between instructions and unwinds normally, so the terminal guard
//! gets to restore the host terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared "please stop" flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run loop to stop after the current instruction.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Route SIGINT (and SIGTERM where supported) to this flag.
    ///
    /// Can only be installed once per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.request())
    }
}
