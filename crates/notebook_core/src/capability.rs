//! Host capability contracts.
//!
//! # Responsibility
//! - Declare the services the core consumes from its host: Markdown
//!   rendering, biometric key retrieval, wall clock and UI-thread dispatch.
//! - Provide default implementations that are safe for headless use.
//!
//! # Invariants
//! - Every capability is passed in through constructors; the core keeps no
//!   global instances of them.
//! - Implementations must be `Send + Sync`; background workers call them.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock timestamps in Unix epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for hosts that replay time and for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Markdown to HTML renderer supplied by the host.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, RenderError>;
}

/// Renderer failure reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "markdown render failed: {}", self.0)
    }
}

impl Error for RenderError {}

/// Biometric-gated key store supplied by the host.
///
/// `key_id` is the canonical path of the encrypted note file.
pub trait BiometricUnlock: Send + Sync {
    fn retrieve_key(&self, key_id: &str) -> Result<Vec<u8>, BiometricError>;
}

/// Biometric key retrieval failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiometricError {
    /// The user rejected or failed the biometric prompt.
    Denied,
    /// The platform has no usable biometric hardware or no stored key.
    Unavailable(String),
}

impl Display for BiometricError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied => write!(f, "biometric unlock denied"),
            Self::Unavailable(reason) => write!(f, "biometric unlock unavailable: {reason}"),
        }
    }
}

impl Error for BiometricError {}

/// Host message queue used to run callbacks on the UI thread.
pub trait Dispatcher: Send + Sync {
    fn post(&self, task: Box<dyn FnOnce() + Send>);
}

/// Dispatcher that runs every task inline on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateDispatcher;

impl Dispatcher for ImmediateDispatcher {
    fn post(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}
