//! Operator cancellation.
//!
//! An [`Interrupt`] is a receiving end that becomes ready when the operator asks the
//! watchdog to stop. Everything that blocks on an external process (the supervisor's
//! read loop, toolkit streams and toolkit commands) selects on it alongside its own
//! work, so an interrupt is noticed within the same wait that would notice new output.
//!
//! Once fired the token stays fired: the first waiter to receive the signal latches it,
//! and every clone reports it from then on through [`Interrupt::check`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, bounded, never};
use log::warn;

use crate::errors::{Result, WatchdogError};

/// Cancellation token shared by the controller, the supervisor and the toolkit.
#[derive(Debug, Clone)]
pub struct Interrupt {
    receiver: Receiver<()>,
    fired: Arc<AtomicBool>,
}

impl Interrupt {
    /// Route Ctrl-C (SIGINT) to a new token.
    ///
    /// # Errors
    /// Returns a configuration error if a handler is already installed.
    pub fn install() -> Result<Self> {
        let (sender, interrupt) = Self::pair();
        let fired = Arc::clone(&interrupt.fired);
        ctrlc::set_handler(move || {
            warn!("Interrupt received, stopping");
            fired.store(true, Ordering::SeqCst);
            // A full channel means an interrupt is already pending.
            let _ = sender.try_send(());
        })
        .map_err(|e| {
            WatchdogError::configuration(format!("cannot install interrupt handler: {e}"))
        })?;
        Ok(interrupt)
    }

    /// A token triggered by sending on the returned sender.
    #[must_use]
    pub fn pair() -> (Sender<()>, Self) {
        let (sender, receiver) = bounded(1);
        (sender, Self { receiver, fired: Arc::new(AtomicBool::new(false)) })
    }

    /// A token that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self { receiver: never(), fired: Arc::new(AtomicBool::new(false)) }
    }

    /// Returns true once the operator has interrupted.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        if self.fired.load(Ordering::SeqCst) {
            return true;
        }
        if self.receiver.try_recv().is_ok() {
            self.latch();
            return true;
        }
        false
    }

    /// # Errors
    /// Returns [`WatchdogError::Interrupted`] if the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_triggered() { Err(WatchdogError::Interrupted) } else { Ok(()) }
    }

    /// Record a signal received directly from [`Interrupt::receiver`].
    pub(crate) fn latch(&self) {
        self.fired.store(true, Ordering::SeqCst);
    }

    /// The channel to select on; call [`Interrupt::latch`] after receiving from it.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}
