//! The per-frame agent.
//!
//! [`FrameAgent`] owns the frame's chord mapper and hint state, turns key
//! tokens into commands, runs the commands that only touch this frame's
//! document, forwards the rest to the coordinator, and answers every
//! [`CoordinatorToFrame`] message.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};

use keynav_chord::{ChordMapper, DroppedBinding, Keymaps};
use keynav_core::errors::{self, RemoteError};
use keynav_core::messages::{
    self, CollectReply, CoordinatorToFrame, FrameToCoordinator, RegisterReply, TargetIndexReply,
};
use keynav_core::{FrameId, Mode};
use keynav_rpc::{Channel, ChannelError, notification_fn, request_fn};
use keynav_settings::{KeymapSettings, KeynavSettings};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::hints::FrameHints;
use crate::registry::FrameRegistry;
use crate::surface::{HintSurface, SurfaceError};

/// Commands a frame executes against its own document.
pub const FRAME_COMMANDS: &[&str] = &[
    "scrollDown",
    "scrollUp",
    "scrollLeft",
    "scrollRight",
    "scrollPageDown",
    "scrollPageUp",
    "scrollTop",
    "scrollBottom",
    "focusInput",
];

const MAX_COUNT: u32 = 9999;

/// Whether the page should still see a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyDisposition {
    /// keynav used the key; suppress the page's default handling.
    Consumed,
    /// keynav had no use for the key.
    NotConsumed,
}

/// Agent configuration.
#[derive(Clone, Debug)]
pub struct FrameAgentConfig {
    /// Per-mode key bindings.
    pub keymaps: KeymapSettings,
    /// Hint label alphabet.
    pub label_alphabet: Vec<char>,
    /// Command names bindings may refer to.
    pub known_commands: HashSet<String>,
}

impl FrameAgentConfig {
    /// Configuration from settings. `coordinator_commands` are the names the
    /// coordinator handles; [`FRAME_COMMANDS`] are always known.
    pub fn from_settings<I, S>(settings: &KeynavSettings, coordinator_commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known_commands = FRAME_COMMANDS
            .iter()
            .map(|c| (*c).to_string())
            .chain(coordinator_commands.into_iter().map(Into::into))
            .collect();
        Self {
            keymaps: settings.keymaps.clone(),
            label_alphabet: settings.hint.label_alphabet(),
            known_commands,
        }
    }
}

struct KeyState {
    mode: Mode,
    keymaps: Keymaps,
    mapper: ChordMapper,
    count: Option<u32>,
}

impl KeyState {
    fn enter(&mut self, mode: Mode) {
        self.mode = mode;
        self.mapper = self.keymaps.mapper(mode);
        self.count = None;
    }
}

/// Keynav's presence inside one frame.
pub struct FrameAgent {
    channel: Channel,
    registry: Arc<FrameRegistry>,
    surface: Arc<dyn HintSurface>,
    frame_id: OnceLock<FrameId>,
    known_commands: HashSet<String>,
    keys: Mutex<KeyState>,
    hints: Mutex<FrameHints>,
    alphabet: RwLock<Vec<char>>,
}

impl std::fmt::Debug for FrameAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAgent")
            .field("identity", &self.registry.identity())
            .field("frame_id", &self.frame_id.get())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

impl FrameAgent {
    /// Attach to the coordinator over `channel`: install the message
    /// handlers, start parent registration, and announce the frame with
    /// `registerFrame`.
    ///
    /// Open `channel` [ordered](keynav_rpc::ChannelConfig::ordered): focus
    /// and mode messages must be applied in the order the coordinator sent
    /// them.
    pub async fn connect(
        channel: Channel,
        registry: Arc<FrameRegistry>,
        surface: Arc<dyn HintSurface>,
        config: FrameAgentConfig,
    ) -> Result<Arc<Self>, ChannelError> {
        let (keymaps, dropped) = Keymaps::build(&config.keymaps, &config.known_commands);
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "some key bindings were dropped");
        }
        let mapper = keymaps.mapper(Mode::Default);
        let agent = Arc::new(Self {
            channel: channel.clone(),
            registry: Arc::clone(&registry),
            surface,
            frame_id: OnceLock::new(),
            known_commands: config.known_commands,
            keys: Mutex::new(KeyState {
                mode: Mode::Default,
                keymaps,
                mapper,
                count: None,
            }),
            hints: Mutex::new(FrameHints::new()),
            alphabet: RwLock::new(config.label_alphabet),
        });

        install_handlers(&channel, Arc::downgrade(&agent));
        registry.start();

        let reply: RegisterReply = channel
            .request_as(&FrameToCoordinator::RegisterFrame {
                identity: registry.identity(),
                is_top: registry.is_top(),
            })
            .await?;
        let _ = agent.frame_id.set(reply.frame_id);
        info!(frame_id = %reply.frame_id, identity = %registry.identity(), "frame connected");
        Ok(agent)
    }

    /// Id the coordinator assigned, once `registerFrame` was answered.
    pub fn frame_id(&self) -> Option<FrameId> {
        self.frame_id.get().copied()
    }

    /// The frame's discovery registry.
    pub fn registry(&self) -> &Arc<FrameRegistry> {
        &self.registry
    }

    /// Channel to the coordinator.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Current mode as last announced by the coordinator.
    pub fn mode(&self) -> Mode {
        self.keys.lock().mode
    }

    /// Pending repeat count.
    pub fn pending_count(&self) -> Option<u32> {
        self.keys.lock().count
    }

    /// Feed one regulated key token.
    ///
    /// In hint mode every key the hint keymap does not consume is forwarded
    /// to the coordinator as `hintKey`, so nothing reaches the page.
    pub fn handle_key(&self, token: &str) -> KeyDisposition {
        let mut keys = self.keys.lock();
        let outcome = keys.mapper.feed(token);
        if let Some(prefix) = &outcome.dropped_prefix {
            debug!(prefix = ?prefix, "abandoned unbound prefix");
        }
        let commands: Vec<String> = outcome.commands().map(ToString::to_string).collect();
        let count = if commands.is_empty() {
            None
        } else {
            keys.count.take()
        };

        let mut disposition = if outcome.consumed {
            KeyDisposition::Consumed
        } else {
            KeyDisposition::NotConsumed
        };
        let mut hint_key = false;
        if !outcome.consumed {
            let digit = count_digit(token, keys.count.is_some()).filter(|_| keys.mode.accepts_count());
            if let Some(digit) = digit {
                let next = keys.count.unwrap_or(0).saturating_mul(10).saturating_add(digit);
                keys.count = Some(next.min(MAX_COUNT));
                disposition = KeyDisposition::Consumed;
            } else if keys.mode == Mode::Hint {
                hint_key = true;
                disposition = KeyDisposition::Consumed;
            } else {
                keys.count = None;
            }
        }
        drop(keys);

        self.run_commands(&commands, count);
        if hint_key {
            self.send(&FrameToCoordinator::HintKey {
                token: token.to_string(),
            });
        }
        disposition
    }

    fn run_commands(&self, commands: &[String], mut count: Option<u32>) {
        for command in commands {
            // count applies to the first command only
            let count = count.take();
            if FRAME_COMMANDS.contains(&command.as_str()) {
                self.run_local(command, count.unwrap_or(1));
            } else {
                self.send(&FrameToCoordinator::Command {
                    command: command.clone(),
                    count,
                });
            }
        }
    }

    fn run_local(&self, command: &str, count: u32) {
        debug!(command, count, "running frame command");
        if let Err(e) = self.surface.run_page_command(command, count) {
            warn!(command, error = %e, "frame command failed");
            return;
        }
        if command == "focusInput" {
            self.request_mode(Mode::Insert, None);
        }
    }

    /// Ask the coordinator to switch the tab into `mode`.
    pub fn request_mode(&self, mode: Mode, data: Option<Value>) {
        self.send(&FrameToCoordinator::RequestMode { mode, data });
    }

    /// Submit hint filter text. Fails with a `NO_MATCH` rejection when
    /// nothing matches; the previous filter then stays in effect.
    pub async fn submit_hint_filter(&self, text: &str) -> Result<(), ChannelError> {
        let _: Value = self
            .channel
            .request_as(&FrameToCoordinator::HintFilter {
                text: text.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Submit a console line.
    pub fn submit_console(&self, line: &str) -> Result<(), ChannelError> {
        self.channel.notify_as(&FrameToCoordinator::ConsoleCommand {
            line: line.to_string(),
        })
    }

    fn send(&self, message: &FrameToCoordinator) {
        if let Err(e) = self.channel.notify_as(message) {
            warn!(error = %e, "could not reach coordinator");
        }
    }

    /// Rebuild keymaps and hint alphabet from new settings. The mapper of
    /// the current mode starts over.
    pub fn apply_settings(&self, settings: &KeynavSettings) -> Vec<DroppedBinding> {
        let (keymaps, dropped) = Keymaps::build(&settings.keymaps, &self.known_commands);
        {
            let mut keys = self.keys.lock();
            keys.keymaps = keymaps;
            let mode = keys.mode;
            keys.enter(mode);
        }
        *self.alphabet.write() = settings.hint.label_alphabet();
        debug!(dropped = dropped.len(), "frame settings reloaded");
        dropped
    }

    /// Stop parent registration and close the coordinator channel.
    pub fn shutdown(&self) {
        self.registry.shutdown();
        self.channel.disconnect();
    }

    /// Answer one coordinator message. Requests reply with the returned
    /// value; notifications discard it.
    #[instrument(skip_all, fields(frame_id = ?self.frame_id.get()))]
    pub fn handle_message(&self, message: CoordinatorToFrame) -> Result<Value, RemoteError> {
        match message {
            CoordinatorToFrame::CollectHint {
                pattern,
                area,
                kind,
            } => {
                let candidates = self.surface.collect(kind, &pattern, area);
                let count = candidates.len();
                self.hints.lock().replace(candidates);
                let children = self.registry.children_in_document_order();
                debug!(count, children = children.len(), "hints collected");
                Ok(messages::encode(&CollectReply { count, children })?)
            }
            CoordinatorToFrame::GetFilterResult { text } => {
                let matches = self.hints.lock().filter_matches(&text);
                Ok(messages::encode(&matches)?)
            }
            CoordinatorToFrame::SetHintLabel { global_indices } => {
                let labels = {
                    let alphabet = self.alphabet.read();
                    self.hints.lock().assign(global_indices, &alphabet)
                };
                self.surface.render_labels(&labels);
                Ok(Value::Null)
            }
            CoordinatorToFrame::FocusHintLink {
                local_index,
                autofocus,
            } => {
                let (previous, key) = {
                    let mut hints = self.hints.lock();
                    let previous = hints.focused();
                    (previous, hints.focus(local_index))
                };
                let key = key.ok_or_else(|| no_candidate(local_index))?;
                // moving within this frame needs no blur from the coordinator
                if let Some(previous) = previous.filter(|p| *p != key) {
                    self.surface.set_focus(previous, false, false);
                }
                self.surface.set_focus(key, true, autofocus);
                Ok(Value::Null)
            }
            CoordinatorToFrame::BlurHintLink { local_index } => {
                let key = self.hints.lock().blur(local_index);
                let key = key.ok_or_else(|| no_candidate(local_index))?;
                self.surface.set_focus(key, false, false);
                Ok(Value::Null)
            }
            CoordinatorToFrame::ApplyFilter { text } => {
                let visibility: Vec<_> = {
                    let hints = self.hints.lock();
                    hints
                        .filter_matches(&text)
                        .into_iter()
                        .filter_map(|m| hints.candidate(m.local_index).map(|c| (c.key, m.matched)))
                        .collect()
                };
                for (key, visible) in visibility {
                    self.surface.set_visible(key, visible);
                }
                Ok(Value::Null)
            }
            CoordinatorToFrame::GetTargetIndex => {
                let local_index = self.hints.lock().target_index();
                Ok(messages::encode(&TargetIndexReply { local_index })?)
            }
            CoordinatorToFrame::ForwardHintCommand {
                command,
                count,
                local_index,
            } => {
                let key = self.hints.lock().candidate(local_index).map(|c| c.key);
                let Some(key) = key else {
                    debug!(local_index, %command, "hint target vanished before command");
                    return Ok(Value::Null);
                };
                match self.surface.run_element_command(key, &command, count) {
                    Ok(()) => Ok(Value::Null),
                    Err(e @ SurfaceError::ElementGone { .. }) => {
                        warn!(%command, error = %e, "hint target vanished");
                        Ok(Value::Null)
                    }
                    Err(e @ SurfaceError::Unsupported { .. }) => {
                        Err(RemoteError::new(errors::UNSUPPORTED, e.to_string()))
                    }
                }
            }
            CoordinatorToFrame::ChangeMode { mode, target, data } => {
                let previous = {
                    let mut keys = self.keys.lock();
                    let previous = keys.mode;
                    keys.enter(mode);
                    previous
                };
                if previous == Mode::Hint && mode != Mode::Hint {
                    self.hints.lock().clear();
                    self.surface.clear_hints();
                }
                let data = if target { data.as_ref() } else { None };
                self.surface.enter_mode(mode, data);
                debug!(%previous, %mode, target, "mode changed");
                Ok(Value::Null)
            }
            CoordinatorToFrame::ShowMessage { text } => {
                self.surface.show_message(&text);
                Ok(Value::Null)
            }
        }
    }
}

fn install_handlers(channel: &Channel, agent: Weak<FrameAgent>) {
    let weak = agent.clone();
    channel.on_request(request_fn(move |payload| {
        let agent = weak.upgrade();
        async move {
            let agent = agent.ok_or_else(agent_gone)?;
            agent.handle_message(messages::decode(payload)?)
        }
    }));
    channel.on_notification(notification_fn(move |payload| {
        let agent = agent.upgrade();
        async move {
            let agent = agent.ok_or_else(agent_gone)?;
            agent.handle_message(messages::decode(payload)?).map(|_| ())
        }
    }));
}

fn agent_gone() -> RemoteError {
    RemoteError::new(errors::FRAME_DISCONNECTED, "frame agent dropped")
}

fn no_candidate(local_index: usize) -> RemoteError {
    RemoteError::new(
        errors::INVALID_OPERATION,
        format!("no hint candidate at local index {local_index}"),
    )
}

/// Digit value of `token` if it may extend a count. `0` only continues one.
fn count_digit(token: &str, started: bool) -> Option<u32> {
    let mut chars = token.chars();
    let digit = chars.next()?.to_digit(10)?;
    if chars.next().is_some() || (digit == 0 && !started) {
        return None;
    }
    Some(digit)
}
