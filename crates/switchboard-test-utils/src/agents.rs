//! In-memory agent config record source.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use switchboard_core::{AgentConfigSource, AgentRecord, CoreError};

/// Agent record source backed by a map, for tests.
#[derive(Default)]
pub struct MemoryAgentSource {
    records: RwLock<HashMap<String, AgentRecord>>,
}

impl MemoryAgentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent record.
    pub fn insert(&self, agent_id: &str, record: AgentRecord) {
        self.records
            .write()
            .insert(agent_id.to_string(), record);
    }
}

#[async_trait]
impl AgentConfigSource for MemoryAgentSource {
    async fn agent_record(&self, agent_id: &str) -> Result<Option<AgentRecord>, CoreError> {
        Ok(self.records.read().get(agent_id).cloned())
    }
}
