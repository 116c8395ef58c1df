//! What gets handed to the messaging client.

use crate::error::Result;
use async_trait::async_trait;
use parcel_acquire::Acquisition;
use serde::Serialize;
use std::path::PathBuf;

/// MIME type used for multi-file shares.
pub const WILDCARD_MIME: &str = "*/*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffAction {
    /// One file with its own MIME type.
    Single,
    /// Any number of files under [`WILDCARD_MIME`].
    Multiple,
}

/// A share request addressed to one channel of the messaging client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handoff {
    pub action: HandoffAction,
    /// Package of the receiving client.
    pub package: String,
    pub channel_id: u64,
    pub mime: String,
    pub paths: Vec<PathBuf>,
    /// Skip the client's chooser and go straight to the channel.
    pub direct_share: bool,
    /// The client needs read access to the shared files.
    pub grant_read: bool,
}

impl Handoff {
    /// Share one file. Text files go out as a multi-file share; the client
    /// drops them when shared on their own.
    pub fn single(package: &str, channel_id: u64, acquisition: &Acquisition) -> Self {
        if acquisition.mime.starts_with("text/") {
            return Self::new(HandoffAction::Multiple, package, channel_id, WILDCARD_MIME, vec![acquisition.local_path.clone()]);
        }
        Self::new(HandoffAction::Single, package, channel_id, &acquisition.mime, vec![acquisition.local_path.clone()])
    }

    /// Share every file in order, or nothing if there are none.
    pub fn multiple(package: &str, channel_id: u64, acquisitions: &[Acquisition]) -> Option<Self> {
        if acquisitions.is_empty() {
            return None;
        }
        let paths = acquisitions.iter().map(|acquisition| acquisition.local_path.clone()).collect();
        Some(Self::new(HandoffAction::Multiple, package, channel_id, WILDCARD_MIME, paths))
    }

    fn new(action: HandoffAction, package: &str, channel_id: u64, mime: &str, paths: Vec<PathBuf>) -> Self {
        Self {
            action,
            package: package.to_string(),
            channel_id,
            mime: mime.to_string(),
            paths,
            direct_share: true,
            grant_read: true,
        }
    }
}

/// Delivers handoffs to the messaging client. Fire and forget: success means
/// the client accepted the request, not that anything reached the channel.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn deliver(&self, handoff: &Handoff) -> Result<()>;
}

/// Brings an app to the foreground.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn bring_to_foreground(&self, package: &str) -> Result<()>;
}
