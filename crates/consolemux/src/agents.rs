// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory agent definition catalog. Agent definitions are externally
//! supplied (§6.2) — the core neither persists them nor exposes REST CRUD —
//! but something in-process still has to hold the current set so the app
//! channel can answer `agents-sync` and fan out `agent-created|updated|deleted`.
//! This is that holder: a plain keyed map plus a broadcast hub, the same
//! shape as the session registry's own event bus.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{broadcast, RwLock};

use crate::model::AgentDefinition;

#[derive(Debug, Clone)]
pub enum AgentCatalogEvent {
    Created { agent: AgentDefinition },
    Updated { agent: AgentDefinition },
    Deleted { agent_id: String },
}

pub struct AgentCatalog {
    agents: RwLock<IndexMap<String, AgentDefinition>>,
    event_tx: broadcast::Sender<AgentCatalogEvent>,
}

impl AgentCatalog {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self { agents: RwLock::new(IndexMap::new()), event_tx })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentCatalogEvent> {
        self.event_tx.subscribe()
    }

    pub async fn list(&self) -> Vec<AgentDefinition> {
        self.agents.read().await.values().cloned().collect()
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentDefinition> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// Insert or replace a definition, publishing `agent-created` the first
    /// time an id is seen and `agent-updated` on every later call.
    pub async fn upsert(&self, definition: AgentDefinition) {
        let mut agents = self.agents.write().await;
        let existed = agents.contains_key(&definition.id);
        agents.insert(definition.id.clone(), definition.clone());
        drop(agents);

        let event = if existed {
            AgentCatalogEvent::Updated { agent: definition }
        } else {
            AgentCatalogEvent::Created { agent: definition }
        };
        let _ = self.event_tx.send(event);
    }

    pub async fn remove(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.write().await;
        let removed = agents.shift_remove(agent_id).is_some();
        drop(agents);

        if removed {
            let _ = self.event_tx.send(AgentCatalogEvent::Deleted { agent_id: agent_id.to_owned() });
        }
        removed
    }
}

#[cfg(test)]
#[path = "agents_tests.rs"]
mod tests;
