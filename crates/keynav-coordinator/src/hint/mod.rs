//! Hint mode across the frame tree.
//!
//! A session goes collecting → active (→ filtering) → closed. Collection
//! walks the frame tree from the top frame; every target gets a global
//! index in frame pre-order, document order within a frame. Frames label
//! their own targets by local position and answer filter queries; the
//! coordinator merges the answers and owns the single focused target.
//!
//! Session state is only touched under the tab's lock and never across an
//! `.await`: each operation snapshots what it needs, awaits frame replies,
//! then re-checks the session generation before committing.

mod collect;
mod session;

pub use session::{FocusChange, HintOptions, HintSession, HintTarget};

use futures::future::join_all;
use keynav_core::messages::{CoordinatorToFrame, FilterMatch, TargetIndexReply};
use keynav_core::{FrameId, Mode};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::{CoordinatorError, HintError};
use crate::tab::TabContext;

/// Relative focus movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintMove {
    /// `count` targets forward, wrapping.
    Next,
    /// `count` targets back, wrapping.
    Prev,
    /// First visible target.
    First,
    /// Last visible target.
    Last,
}

impl TabContext {
    /// Enter hint mode: collect targets from every frame, label them, and
    /// focus the first. Nothing to hint aborts back to default mode.
    #[instrument(skip_all, fields(tab = %self.tab_id(), kind = ?options.kind))]
    pub async fn start_hints(&self, options: HintOptions) -> Result<(), CoordinatorError> {
        self.change_mode(Mode::Hint, None, None);
        let generation = self.next_generation();

        let frames = match collect::collect_tree(self, FrameId::TOP, &options.collect_message(), Vec::new()).await {
            Ok(frames) => frames,
            Err(e) => {
                self.abort_hints(generation, "hint collection failed");
                return Err(e);
            }
        };
        let autofocus = options.autofocus;
        let Some(mut session) = HintSession::new(generation, options, &frames) else {
            self.abort_hints(generation, HintError::NoTargets.to_string());
            return Err(HintError::NoTargets.into());
        };

        let assignments = session.assignments();
        let focus = session.change_focus(0);
        {
            let mut guard = self.hint.lock();
            if !self.commit_allowed(generation) {
                return Ok(());
            }
            info!(targets = session.len(), frames = assignments.len(), "hint session started");
            *guard = Some(session);
        }

        for (frame_id, global_indices) in assignments {
            self.notify_logged(frame_id, &CoordinatorToFrame::SetHintLabel { global_indices });
        }
        if let Some(change) = focus {
            self.send_focus(change, autofocus).await;
        }
        Ok(())
    }

    /// Leave hint mode.
    pub fn close_hints(&self) {
        if self.mode() == Mode::Hint {
            self.change_mode(Mode::Default, None, None);
        }
    }

    /// End hint mode for `generation`. A superseded session leaves the
    /// newer one alone.
    fn abort_hints(&self, generation: u64, message: impl Into<String>) {
        if !self.is_current_generation(generation) {
            debug!(generation, "superseded hint session not aborting");
            return;
        }
        self.show_message(message);
        self.change_mode(Mode::Default, None, None);
    }

    /// Whether a session built for `generation` may still be installed.
    /// Call with the `hint` lock held.
    fn commit_allowed(&self, generation: u64) -> bool {
        if self.mode() != Mode::Hint {
            debug!(generation, "hint mode left during collection");
            return false;
        }
        if !self.is_current_generation(generation) {
            debug!(generation, "hint session superseded during collection");
            return false;
        }
        true
    }

    fn active_session<T>(&self, f: impl FnOnce(&mut HintSession) -> T) -> Result<T, HintError> {
        let mut guard = self.hint.lock();
        let session = guard.as_mut().ok_or(HintError::NotActive)?;
        Ok(f(session))
    }

    fn session_if<T>(&self, generation: u64, f: impl FnOnce(&mut HintSession) -> T) -> Result<T, HintError> {
        let mut guard = self.hint.lock();
        match guard.as_mut() {
            Some(session) if session.generation() == generation => Ok(f(session)),
            _ => Err(HintError::NotActive),
        }
    }

    /// Blur first and wait for it, so two frames never both show focus.
    async fn send_focus(&self, change: FocusChange, autofocus: bool) {
        if let Some(blur) = change.blur {
            let result: Result<Value, _> = self
                .request(
                    blur.frame_id,
                    &CoordinatorToFrame::BlurHintLink {
                        local_index: blur.local_index,
                    },
                )
                .await;
            if let Err(e) = result {
                debug!(frame_id = %blur.frame_id, error = %e, "blur not acknowledged");
            }
        }
        self.notify_logged(
            change.focus.frame_id,
            &CoordinatorToFrame::FocusHintLink {
                local_index: change.focus.local_index,
                autofocus,
            },
        );
    }

    async fn focus_position(&self, position: impl FnOnce(&HintSession) -> Option<usize>) -> Result<(), CoordinatorError> {
        let planned = self.active_session(|s| {
            let change = position(s).and_then(|p| s.change_focus(p));
            (change, s.options().autofocus)
        })?;
        if let (Some(change), autofocus) = planned {
            self.send_focus(change, autofocus).await;
        }
        Ok(())
    }

    /// Move focus relative to the current target.
    pub async fn hint_move(&self, movement: HintMove, count: u32) -> Result<(), CoordinatorError> {
        let steps = isize::try_from(count.max(1)).unwrap_or(1);
        self.focus_position(|s| match movement {
            HintMove::Next => s.step_position(steps),
            HintMove::Prev => s.step_position(-steps),
            HintMove::First => Some(0),
            HintMove::Last => s.last_position(),
        })
        .await
    }

    /// Digit input: extend the current display position by `digit`.
    pub async fn hint_digit(&self, digit: char) -> Result<(), CoordinatorError> {
        self.focus_position(|s| s.digit_position(digit)).await
    }

    async fn filter_results(&self, owners: &[FrameId], text: &str) -> Vec<(FrameId, Vec<FilterMatch>)> {
        let message = CoordinatorToFrame::GetFilterResult {
            text: text.to_string(),
        };
        let replies = join_all(
            owners
                .iter()
                .map(|frame_id| self.request::<Vec<FilterMatch>>(*frame_id, &message)),
        )
        .await;
        owners
            .iter()
            .zip(replies)
            .filter_map(|(frame_id, reply)| match reply {
                Ok(matches) => Some((*frame_id, matches)),
                Err(e) => {
                    warn!(%frame_id, error = %e, "no filter result from frame");
                    None
                }
            })
            .collect()
    }

    fn broadcast_filter(&self, text: &str) {
        for frame_id in self.frame_ids() {
            self.notify_logged(
                frame_id,
                &CoordinatorToFrame::ApplyFilter {
                    text: text.to_string(),
                },
            );
        }
    }

    /// Filter the targets. When nothing matches, the previous filter stays,
    /// a "no match" message is shown and [`HintError::NoMatch`] returned.
    #[instrument(skip(self), fields(tab = %self.tab_id()))]
    pub async fn hint_filter(&self, text: &str) -> Result<(), CoordinatorError> {
        let (generation, owners) = self.active_session(|s| (s.generation(), s.owners()))?;
        let results = self.filter_results(&owners, text).await;

        let committed = self.session_if(generation, |s| {
            s.apply_filter(text, &results)
                .map(|()| (s.change_focus(0), s.options().autofocus))
        })?;
        match committed {
            Ok((focus, autofocus)) => {
                self.broadcast_filter(text);
                if let Some(change) = focus {
                    self.send_focus(change, autofocus).await;
                }
                Ok(())
            }
            Err(e) => {
                self.show_message(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Drop the filter so every target is visible again.
    pub async fn clear_hint_filter(&self) -> Result<(), CoordinatorError> {
        let (focus, autofocus) = self.active_session(|s| {
            s.clear_filter();
            (s.change_focus(0), s.options().autofocus)
        })?;
        self.broadcast_filter("");
        if let Some(change) = focus {
            self.send_focus(change, autofocus).await;
        }
        Ok(())
    }

    /// A key token the hint keymap left unconsumed.
    pub async fn hint_key(&self, token: &str) -> Result<(), CoordinatorError> {
        let mut chars = token.chars();
        let single = match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        };
        match (token, single) {
            ("<Esc>", _) => {
                self.close_hints();
                Ok(())
            }
            ("<BS>", _) => {
                let mut text = self.active_session(|s| s.filter_text().to_string())?;
                if text.pop().is_none() {
                    return Ok(());
                }
                if text.is_empty() {
                    self.clear_hint_filter().await
                } else {
                    self.hint_filter(&text).await
                }
            }
            (_, Some(c)) if c.is_ascii_digit() => self.hint_digit(c).await,
            ("<Space>", _) => self.extend_filter(' ').await,
            (_, Some(c)) if !c.is_control() => self.extend_filter(c).await,
            _ => {
                debug!(token, "hint key ignored");
                Ok(())
            }
        }
    }

    async fn extend_filter(&self, c: char) -> Result<(), CoordinatorError> {
        let mut text = self.active_session(|s| s.filter_text().to_string())?;
        text.push(c);
        self.hint_filter(&text).await
    }

    /// Re-collect after the page changed, keeping focus on the same element
    /// when it still exists. If the focused frame lost all its targets,
    /// hint mode ends.
    #[instrument(skip_all, fields(tab = %self.tab_id()))]
    pub async fn reconstruct_hints(&self) -> Result<(), CoordinatorError> {
        let (options, previous, filter_text) = self.active_session(|s| {
            (
                s.options().clone(),
                s.current_target(),
                s.filter_text().to_string(),
            )
        })?;
        let generation = self.next_generation();

        let frames = match collect::collect_tree(self, FrameId::TOP, &options.collect_message(), Vec::new()).await {
            Ok(frames) => frames,
            Err(e) => {
                self.abort_hints(generation, "hint collection failed");
                return Err(e);
            }
        };
        let Some(previous) = previous else {
            return Err(HintError::NotActive.into());
        };
        let still_has_targets = frames
            .iter()
            .any(|&(frame_id, count)| frame_id == previous.frame_id && count > 0);
        let autofocus = options.autofocus;
        let session = HintSession::new(generation, options, &frames);
        let Some(mut session) = session.filter(|_| still_has_targets) else {
            info!(frame_id = %previous.frame_id, "focused frame has no hint targets left");
            self.abort_hints(generation, HintError::NoTargets.to_string());
            return Ok(());
        };
        if !self.is_current_generation(generation) {
            debug!(generation, "hint rebuild superseded during collection");
            return Ok(());
        }

        for (frame_id, global_indices) in session.assignments() {
            self.notify_logged(frame_id, &CoordinatorToFrame::SetHintLabel { global_indices });
        }

        let reply: TargetIndexReply = match self
            .request(previous.frame_id, &CoordinatorToFrame::GetTargetIndex)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(frame_id = %previous.frame_id, error = %e, "target index unavailable");
                TargetIndexReply::default()
            }
        };
        let kept = reply.local_index.map(|local_index| HintTarget {
            frame_id: previous.frame_id,
            local_index,
        });
        let global = session.global_index(kept.unwrap_or(HintTarget {
            frame_id: previous.frame_id,
            local_index: 0,
        }));

        if !filter_text.is_empty() {
            let results = self.filter_results(&session.owners(), &filter_text).await;
            match session.apply_filter(&filter_text, &results) {
                Ok(()) => self.broadcast_filter(&filter_text),
                Err(_) => {
                    debug!(filter = %filter_text, "filter matches nothing after rebuild, clearing");
                    self.broadcast_filter("");
                }
            }
        }

        let position = global.and_then(|g| session.position_of(g)).unwrap_or(0);
        session.set_focused(kept);
        let focus = session.change_focus(position);
        {
            let mut guard = self.hint.lock();
            if !self.commit_allowed(generation) {
                return Ok(());
            }
            *guard = Some(session);
        }
        if let Some(change) = focus {
            self.send_focus(change, autofocus).await;
        }
        Ok(())
    }

    /// Run an element command on the focused target without leaving hint
    /// mode.
    pub fn forward_hint_command(&self, command: &str, count: u32) -> Result<(), CoordinatorError> {
        let target = self
            .active_session(|s| s.current_target())?
            .ok_or(HintError::NotActive)?;
        debug!(frame_id = %target.frame_id, local_index = target.local_index, command, "forwarding hint command");
        self.notify(
            target.frame_id,
            &CoordinatorToFrame::ForwardHintCommand {
                command: command.to_string(),
                count: count.max(1),
                local_index: target.local_index,
            },
        )
    }
}
