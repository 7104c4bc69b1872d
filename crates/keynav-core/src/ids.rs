//! Branded ID newtypes for type safety.
//!
//! Tabs are identified by a UUID v7 string. Everything that lives inside a
//! single page load (frames, windows, elements) uses small integers: they are
//! process-local handles, never persisted, and cheap to copy across
//! message boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Raw integer value.
            #[must_use]
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(v: $inner) -> Self {
                Self(v)
            }
        }
    };
}

/// Unique identifier for a browser tab.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(String);

impl TabId {
    /// Fresh time-ordered id (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for TabId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

numeric_id! {
    /// Coordinator-assigned frame id, unique within a tab. `0` is the top frame.
    FrameId(u32)
}

numeric_id! {
    /// Identity a frame declares for itself at creation, random per page load.
    FrameIdentity(u32)
}

numeric_id! {
    /// Handle of a browsing context (window) within one page.
    WindowHandle(u32)
}

numeric_id! {
    /// Stable handle of a DOM element for the lifetime of its frame.
    ElementKey(u64)
}

impl FrameId {
    /// The top frame of every tab.
    pub const TOP: Self = Self(0);

    /// Whether this is the tab's top frame.
    #[must_use]
    pub const fn is_top(self) -> bool {
        self.0 == 0
    }
}

impl FrameIdentity {
    /// Pick a fresh random identity.
    #[must_use]
    pub fn random() -> Self {
        Self(rand::random())
    }
}
