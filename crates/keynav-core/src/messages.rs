//! Typed message vocabulary.
//!
//! Messages are internally tagged by `name` so every payload is a plain JSON
//! object such as `{"name": "collectHint", "pattern": "a", ...}`. Decoding a
//! payload into one of these enums is the dispatch table: a handler is a
//! `match` over the variants.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MessageError;
use crate::ids::{FrameId, FrameIdentity};
use crate::mode::Mode;

/// Messages a frame sends to its tab's coordinator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FrameToCoordinator {
    /// First contact: announce identity, receive a [`RegisterReply`].
    RegisterFrame {
        /// Identity the frame picked for itself.
        identity: FrameIdentity,
        /// Whether the frame is the top-level document of its tab.
        is_top: bool,
    },
    /// A resolved chord command the frame does not execute itself.
    Command {
        /// Command name.
        command: String,
        /// Optional repeat count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
    },
    /// Ask the coordinator to switch the whole tab into `mode`.
    RequestMode {
        /// Requested mode.
        mode: Mode,
        /// Mode-entry payload for the requesting frame.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// Key token typed in hint mode that the hint keymap did not consume.
    HintKey {
        /// Regulated key token.
        token: String,
    },
    /// Apply a hint filter; rejected with `NO_MATCH` when nothing matches.
    HintFilter {
        /// Filter text.
        text: String,
    },
    /// A line entered in console mode.
    ConsoleCommand {
        /// Raw command line.
        line: String,
    },
}

/// Which action a hint session is collecting targets for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HintKind {
    /// Click / activate the chosen element.
    #[default]
    Click,
    /// Open the chosen link in a new tab.
    NewTab,
    /// Focus the chosen element.
    Focus,
}

impl HintKind {
    /// Element command forwarded to the owning frame when a target is chosen.
    #[must_use]
    pub const fn element_command(self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::NewTab => "openInNewTab",
            Self::Focus => "focus",
        }
    }
}

/// Viewport-relative area that candidates must intersect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Area {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Area {
    /// Whether two areas overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Messages the coordinator sends to a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CoordinatorToFrame {
    /// Enumerate local candidates; reply with a [`CollectReply`].
    CollectHint {
        /// Selector pattern candidates must match.
        pattern: String,
        /// Optional bounds candidates must intersect.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        area: Option<Area>,
        /// Hint kind being collected.
        kind: HintKind,
    },
    /// Match every local candidate against `text`; reply with `Vec<FilterMatch>`.
    GetFilterResult {
        /// Filter text.
        text: String,
    },
    /// Global indices owned by this frame, in local order.
    SetHintLabel {
        /// Global indices; position in this list is the local index.
        global_indices: Vec<usize>,
    },
    /// Give the focus highlight to a local candidate.
    FocusHintLink {
        /// Local candidate index.
        local_index: usize,
        /// Also move DOM focus to the element.
        autofocus: bool,
    },
    /// Remove the focus highlight from a local candidate.
    BlurHintLink {
        /// Local candidate index.
        local_index: usize,
    },
    /// Show only the candidates that match `text`.
    ApplyFilter {
        /// Committed filter text.
        text: String,
    },
    /// Report the local index of the focused element; reply with a [`TargetIndexReply`].
    GetTargetIndex,
    /// Run an element command against a local candidate without leaving hint mode.
    ForwardHintCommand {
        /// Element command name.
        command: String,
        /// Repeat count.
        count: u32,
        /// Local candidate index.
        local_index: usize,
    },
    /// The tab entered `mode`.
    ChangeMode {
        /// New mode.
        mode: Mode,
        /// Whether this frame carries the mode-entry payload.
        target: bool,
        /// Mode-entry payload (only meaningful when `target`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
    /// Show a one-line status message.
    ShowMessage {
        /// Message text.
        text: String,
    },
}

/// Reply to [`FrameToCoordinator::RegisterFrame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReply {
    /// Assigned frame id.
    pub frame_id: FrameId,
}

/// Reply to [`CoordinatorToFrame::CollectHint`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectReply {
    /// Number of local candidates, in document order.
    pub count: usize,
    /// Identities of direct child frames, in document order.
    pub children: Vec<FrameIdentity>,
}

/// One entry of the reply to [`CoordinatorToFrame::GetFilterResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMatch {
    /// Local candidate index.
    pub local_index: usize,
    /// Whether the candidate matches the filter.
    pub matched: bool,
}

/// Reply to [`CoordinatorToFrame::GetTargetIndex`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetIndexReply {
    /// Local index of the focused element, if it is still a candidate.
    pub local_index: Option<usize>,
}

/// Window-level messages between a frame and its direct parent.
///
/// These travel over the page's `postMessage` primitive, not over a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "camelCase")]
pub enum WindowMessage {
    /// Child announces itself to its parent (repeated until acknowledged).
    RegisterChild {
        /// Child's declared identity.
        identity: FrameIdentity,
    },
    /// Parent acknowledges a registration.
    CompleteRegisterChild {
        /// Acknowledged identity.
        identity: FrameIdentity,
    },
    /// Child is going away.
    UnregisterChild {
        /// Child's declared identity.
        identity: FrameIdentity,
    },
}

/// Serialize a message into a channel payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Value, MessageError> {
    Ok(serde_json::to_value(message)?)
}

/// Decode a channel payload into a typed message.
pub fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, MessageError> {
    Ok(serde_json::from_value(payload)?)
}
