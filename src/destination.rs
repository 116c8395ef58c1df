use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Looks up rooms by their human-readable name.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Channel id of the room called `name`, if there is one.
    async fn resolve(&self, name: &str) -> Option<u64>;
}

/// Directory backed by the `rooms` table of the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigDirectory {
    rooms: BTreeMap<String, u64>,
}

impl ConfigDirectory {
    pub fn new(rooms: BTreeMap<String, u64>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl Directory for ConfigDirectory {
    async fn resolve(&self, name: &str) -> Option<u64> {
        self.rooms.get(name).copied()
    }
}

/// Turn a destination into a channel id. All-digit strings are taken as ids
/// directly; anything else goes through `directory`.
pub async fn resolve_destination(destination: &str, directory: &dyn Directory) -> Result<u64> {
    let destination = destination.trim();
    if !destination.is_empty()
        && destination.bytes().all(|b| b.is_ascii_digit())
        && let Ok(id) = destination.parse()
    {
        return Ok(id);
    }
    match directory.resolve(destination).await {
        Some(id) => {
            tracing::debug!(room = destination, id, "resolved room");
            Ok(id)
        },
        None => exn::bail!(ErrorKind::UnknownDestination(destination.to_string())),
    }
}
