//! Public SDK surface for Switchboard.
//!
//! This crate re-exports the core building blocks and provides a
//! small initialization helper to keep consumer setup consistent.

pub use switchboard_config as config;
pub use switchboard_core as core;
pub use switchboard_protocol as protocol;

/// Initialize logging via env_logger when the `logging` feature is
/// enabled; a no-op otherwise. Binaries are expected to call this
/// early in startup so log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::try_init();
    }
}
