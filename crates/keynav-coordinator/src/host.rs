//! The browser's tab and history API.

use async_trait::async_trait;
use keynav_core::TabId;

use crate::errors::HostError;

/// Tab-level operations only the host can perform.
///
/// `count` is the user's repeat count, at least 1.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Activate the tab `count` positions to the right, wrapping.
    async fn next_tab(&self, tab: &TabId, count: u32) -> Result<(), HostError>;

    /// Activate the tab `count` positions to the left, wrapping.
    async fn prev_tab(&self, tab: &TabId, count: u32) -> Result<(), HostError>;

    /// Close `tab`.
    async fn close_tab(&self, tab: &TabId) -> Result<(), HostError>;

    /// Reload `tab`.
    async fn reload_tab(&self, tab: &TabId) -> Result<(), HostError>;

    /// Go back `count` history entries.
    async fn history_back(&self, tab: &TabId, count: u32) -> Result<(), HostError>;

    /// Go forward `count` history entries.
    async fn history_forward(&self, tab: &TabId, count: u32) -> Result<(), HostError>;

    /// Open `url` in a new tab next to `tab`.
    async fn open_url(&self, tab: &TabId, url: &str) -> Result<(), HostError>;
}
