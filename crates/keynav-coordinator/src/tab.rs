//! Per-tab state: frame records, current mode, hint session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use keynav_core::messages::CoordinatorToFrame;
use keynav_core::{FrameId, FrameIdentity, Mode, TabId};
use keynav_rpc::Channel;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::CoordinatorError;
use crate::hint::HintSession;

/// A connected frame.
#[derive(Clone, Debug)]
pub struct FrameRecord {
    /// Coordinator-assigned id.
    pub frame_id: FrameId,
    /// Identity the frame declared.
    pub identity: FrameIdentity,
    /// Channel to the frame.
    pub channel: Channel,
}

#[derive(Debug)]
struct FrameTable {
    records: HashMap<FrameId, FrameRecord>,
    identities: HashMap<FrameIdentity, FrameId>,
    next_id: u32,
}

impl FrameTable {
    fn allocate(&mut self) -> FrameId {
        loop {
            let candidate = FrameId(self.next_id);
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if !candidate.is_top() && !self.records.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// Everything the coordinator knows about one tab.
pub struct TabContext {
    tab_id: TabId,
    frames: RwLock<FrameTable>,
    mode: RwLock<Mode>,
    pub(crate) hint: Mutex<Option<HintSession>>,
    generations: AtomicU64,
}

impl std::fmt::Debug for TabContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabContext")
            .field("tab_id", &self.tab_id)
            .field("frames", &self.frame_count())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl TabContext {
    /// Empty context for `tab_id`.
    pub fn new(tab_id: TabId) -> Self {
        Self {
            tab_id,
            frames: RwLock::new(FrameTable {
                records: HashMap::new(),
                identities: HashMap::new(),
                next_id: 1,
            }),
            mode: RwLock::new(Mode::Default),
            hint: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    /// The tab.
    pub fn tab_id(&self) -> &TabId {
        &self.tab_id
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        *self.mode.read()
    }

    /// Number of connected frames.
    pub fn frame_count(&self) -> usize {
        self.frames.read().records.len()
    }

    /// Ids of connected frames, ascending.
    pub fn frame_ids(&self) -> Vec<FrameId> {
        let mut ids: Vec<FrameId> = self.frames.read().records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Record a frame and assign its id. The top frame is always id 0; a
    /// new top frame (navigation) replaces the old record.
    pub fn register_frame(&self, identity: FrameIdentity, is_top: bool, channel: Channel) -> FrameId {
        let mut table = self.frames.write();
        let frame_id = if is_top { FrameId::TOP } else { table.allocate() };
        if let Some(old) = table.records.insert(
            frame_id,
            FrameRecord {
                frame_id,
                identity,
                channel,
            },
        ) {
            let _ = table.identities.remove(&old.identity);
            debug!(tab = %self.tab_id, %frame_id, old_identity = %old.identity, "frame record replaced");
        }
        let _ = table.identities.insert(identity, frame_id);
        info!(tab = %self.tab_id, %frame_id, %identity, "frame registered");
        frame_id
    }

    /// Remove a frame's record if it still belongs to `identity`.
    /// Returns whether a record was removed.
    pub fn remove_frame(&self, frame_id: FrameId, identity: FrameIdentity) -> bool {
        let mut table = self.frames.write();
        if table.records.get(&frame_id).map(|r| r.identity) != Some(identity) {
            return false;
        }
        let _ = table.records.remove(&frame_id);
        let _ = table.identities.remove(&identity);
        info!(tab = %self.tab_id, %frame_id, "frame disconnected");
        true
    }

    /// Frame id of a declared identity.
    pub fn frame_for_identity(&self, identity: FrameIdentity) -> Option<FrameId> {
        self.frames.read().identities.get(&identity).copied()
    }

    /// Channel of a connected frame. A missing record fails immediately.
    pub fn channel(&self, frame_id: FrameId) -> Result<Channel, CoordinatorError> {
        match self.frames.read().records.get(&frame_id) {
            Some(record) => Ok(record.channel.clone()),
            None => {
                warn!(tab = %self.tab_id, %frame_id, "no record for frame");
                Err(CoordinatorError::FrameDisconnected { frame_id })
            }
        }
    }

    /// Send a typed request to one frame and decode its reply.
    pub async fn request<R: DeserializeOwned>(
        &self,
        frame_id: FrameId,
        message: &CoordinatorToFrame,
    ) -> Result<R, CoordinatorError> {
        let channel = self.channel(frame_id)?;
        channel
            .request_as(message)
            .await
            .map_err(|source| CoordinatorError::Channel { frame_id, source })
    }

    /// Send a typed notification to one frame.
    pub fn notify(&self, frame_id: FrameId, message: &CoordinatorToFrame) -> Result<(), CoordinatorError> {
        self.channel(frame_id)?
            .notify_as(message)
            .map_err(|source| CoordinatorError::Channel { frame_id, source })
    }

    /// Notify one frame, logging failure instead of returning it.
    pub(crate) fn notify_logged(&self, frame_id: FrameId, message: &CoordinatorToFrame) {
        if let Err(e) = self.notify(frame_id, message) {
            warn!(tab = %self.tab_id, %frame_id, error = %e, "notification not delivered");
        }
    }

    /// Show a status message in the top frame.
    pub fn show_message(&self, text: impl Into<String>) {
        let text = text.into();
        debug!(tab = %self.tab_id, %text, "status message");
        self.notify_logged(FrameId::TOP, &CoordinatorToFrame::ShowMessage { text });
    }

    /// Switch the tab to `mode` and tell every frame. Only `target` gets
    /// `data`. Leaving hint mode ends the hint session.
    pub fn change_mode(&self, mode: Mode, target: Option<FrameId>, data: Option<Value>) {
        let previous = std::mem::replace(&mut *self.mode.write(), mode);
        if previous == Mode::Hint && mode != Mode::Hint {
            let _ = self.hint.lock().take();
        }
        let channels: Vec<(FrameId, Channel)> = self
            .frames
            .read()
            .records
            .values()
            .map(|r| (r.frame_id, r.channel.clone()))
            .collect();
        debug!(tab = %self.tab_id, %previous, %mode, frames = channels.len(), "changing mode");

        for (frame_id, channel) in channels {
            let is_target = target == Some(frame_id);
            let message = CoordinatorToFrame::ChangeMode {
                mode,
                target: is_target,
                data: if is_target { data.clone() } else { None },
            };
            if let Err(e) = channel.notify_as(&message) {
                warn!(tab = %self.tab_id, %frame_id, error = %e, "changeMode not delivered");
            }
        }
    }

    /// Next hint session generation.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether `generation` is the latest one handed out.
    pub(crate) fn is_current_generation(&self, generation: u64) -> bool {
        self.generations.load(Ordering::Relaxed) == generation
    }

    /// Snapshot of the current hint session.
    pub fn hint_session(&self) -> Option<HintSession> {
        self.hint.lock().clone()
    }
}
