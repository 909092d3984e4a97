//! Cancellation and Ctrl+C handling.
//!
//! A scan is cancelled cooperatively: long-running stages poll a
//! [`CancelCheck`] between files and stop when it returns `true`.
//! [`ShutdownHandler`] wraps an `AtomicBool` that Ctrl+C sets, and hands
//! out a check closure over it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupekeep::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//! let cancel = handler.cancel_check();
//!
//! // Pass `cancel` to DuplicateFinder or Walker
//! if cancel() {
//!     println!("Cancellation requested");
//! }
//! ```
//!
//! # Exit Codes
//!
//! When Ctrl+C is received the flag is set and "Interrupted. Finishing
//! current files..." is printed to stderr. The CLI exits with code 130.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation predicate polled by long-running stages.
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Build a [`CancelCheck`] from a shared flag.
#[must_use]
pub fn flag_check(flag: Arc<AtomicBool>) -> CancelCheck {
    Arc::new(move || flag.load(Ordering::SeqCst))
}

/// Centralized shutdown handler.
///
/// Wraps an `AtomicBool` set when Ctrl+C is received.
///
/// # Example
///
/// ```rust,no_run
/// use dupekeep::signal::ShutdownHandler;
///
/// let handler = ShutdownHandler::new();
/// let check = handler.cancel_check();
/// handler.request_shutdown();
/// assert!(check());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a new shutdown handler with the flag initially clear.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Manually request a shutdown.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Get a clone of the shutdown flag.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// A cancellation check observing this handler's flag.
    #[must_use]
    pub fn cancel_check(&self) -> CancelCheck {
        flag_check(self.get_flag())
    }

    /// Clear the shutdown flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that sets the shutdown flag on interrupt.
///
/// Call once, before the scan starts. Repeated calls in one process (as
/// happens in tests) reuse the first handler after clearing its flag.
///
/// # Errors
///
/// Returns [`SignalError`] only if the hook cannot be installed and no
/// handler was registered earlier in this process.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    match ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);

        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing current files..."
        );
        let _ = std::io::stderr().flush();

        log::info!("Cancellation signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            let fallback = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
            fallback.reset();
            Ok(fallback)
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
