//! Command catalog.

use driverlab_core::{CommandMeta, DriverMeta};

/// Commands the connected driver currently offers.
///
/// Rebuilt from scratch on every `meta` frame; a restarted or different
/// driver may expose a smaller or unrelated command set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandCatalog {
    commands: Vec<CommandMeta>,
}

impl CommandCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in the command list of `meta`. `None` empties the catalog.
    pub fn replace(&mut self, meta: Option<&DriverMeta>) {
        self.commands = meta.map(|m| m.commands.clone()).unwrap_or_default();
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Commands in driver order.
    pub fn list(&self) -> &[CommandMeta] {
        &self.commands
    }

    pub fn get(&self, name: &str) -> Option<&CommandMeta> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
