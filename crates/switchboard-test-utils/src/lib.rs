//! Test helpers shared across Switchboard crates.

pub mod agents;
pub mod gateway;
pub mod providers;

pub use agents::MemoryAgentSource;
pub use gateway::ScriptedTransport;
pub use providers::{RecordingSink, ScriptedProvider, scripted_registration};
