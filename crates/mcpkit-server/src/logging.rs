//! The `logging/setLevel` minimum-level cell. Storing the negotiated
//! level here gates `notifications/message` emission only — it does not
//! reconfigure the process-wide `tracing` subscriber, which stays the
//! embedder's responsibility.

use std::sync::atomic::{AtomicU8, Ordering};

pub use mcpkit_core::LogLevel;

fn level_from_u8(value: u8) -> LogLevel {
    match value {
        0 => LogLevel::Debug,
        1 => LogLevel::Info,
        2 => LogLevel::Notice,
        3 => LogLevel::Warning,
        4 => LogLevel::Error,
        5 => LogLevel::Critical,
        6 => LogLevel::Alert,
        _ => LogLevel::Emergency,
    }
}

pub struct LevelFilter(AtomicU8);

impl LevelFilter {
    pub fn new(initial: LogLevel) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn set(&self, level: LogLevel) {
        self.0.store(level as u8, Ordering::SeqCst);
    }

    pub fn get(&self) -> LogLevel {
        level_from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn allows(&self, level: LogLevel) -> bool {
        level >= self.get()
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
