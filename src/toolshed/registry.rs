/// Hot-reload tool registry using ArcSwap
///
/// Static asset requests resolve tools through this map on every call, so it
/// is read lock-free. Installs and removals swap in a fresh copy of the map.

use crate::toolshed::{storage::InstalledToolStore, types::InstalledTool};
use anyhow::Result;
use arc_swap::ArcSwap;
use std::{collections::HashMap, sync::Arc};

#[derive(Debug)]
pub struct ToolRegistry {
    /// Key: tool guid
    tools: ArcSwap<HashMap<String, InstalledTool>>,
    storage: InstalledToolStore,
}

impl ToolRegistry {
    pub fn new(storage: InstalledToolStore) -> Self {
        Self {
            tools: ArcSwap::new(Arc::new(HashMap::new())),
            storage,
        }
    }

    /// Populate the registry from storage at startup
    pub async fn init_from_storage(&self) -> Result<()> {
        let tools = self.storage.load_all().await?;
        self.tools.store(Arc::new(tools));

        tracing::info!("🧰 Initialized tool registry with {} tools", self.tools.load().len());

        Ok(())
    }

    /// Re-read one tool from storage and swap it into the registry
    pub async fn reload_tool(&self, guid: &str) -> Result<()> {
        let tool = self
            .storage
            .get(guid)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tool not found: {}", guid))?;

        let current = self.tools.load();
        let mut next = (**current).clone();
        next.insert(guid.to_string(), tool);
        self.tools.store(Arc::new(next));

        tracing::info!("🔄 Hot-reloaded tool: {}", guid);

        Ok(())
    }

    pub fn get_tool(&self, guid: &str) -> Option<InstalledTool> {
        self.tools.load().get(guid).cloned()
    }

    pub fn list_guids(&self) -> Vec<String> {
        let mut guids: Vec<String> = self.tools.load().keys().cloned().collect();
        guids.sort();
        guids
    }

    pub fn remove_tool(&self, guid: &str) {
        let current = self.tools.load();
        let mut next = (**current).clone();

        if next.remove(guid).is_some() {
            self.tools.store(Arc::new(next));
            tracing::info!("🗑️ Removed tool from registry: {}", guid);
        }
    }
}
