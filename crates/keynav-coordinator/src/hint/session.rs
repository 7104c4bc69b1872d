//! Hint session state.
//!
//! Pure data: every method is synchronous, so the tab can mutate a session
//! under its lock and send the resulting messages after releasing it.

use std::collections::HashMap;

use keynav_core::FrameId;
use keynav_core::messages::{Area, CoordinatorToFrame, FilterMatch, HintKind};
use keynav_settings::HintSettings;

use crate::errors::HintError;

/// One hint target: which frame owns it and where it sits in that frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HintTarget {
    /// Owning frame.
    pub frame_id: FrameId,
    /// Position in the owning frame's candidate list.
    pub local_index: usize,
}

/// Messages needed to move the focus highlight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusChange {
    /// Target to blur first; only set when the owning frame changes.
    pub blur: Option<HintTarget>,
    /// Target to focus.
    pub focus: HintTarget,
}

/// What a session collects and how it focuses.
#[derive(Clone, Debug, PartialEq)]
pub struct HintOptions {
    /// Action the targets are for.
    pub kind: HintKind,
    /// Selector pattern candidates must match.
    pub pattern: String,
    /// Bounds candidates must intersect.
    pub area: Option<Area>,
    /// Move DOM focus along with the highlight.
    pub autofocus: bool,
}

impl HintOptions {
    /// Options for `kind` with the configured pattern.
    pub fn from_settings(kind: HintKind, settings: &HintSettings) -> Self {
        Self {
            kind,
            pattern: settings.patterns.for_kind(kind).to_string(),
            area: None,
            autofocus: settings.autofocus,
        }
    }

    /// The `collectHint` request for these options.
    pub fn collect_message(&self) -> CoordinatorToFrame {
        CoordinatorToFrame::CollectHint {
            pattern: self.pattern.clone(),
            area: self.area,
            kind: self.kind,
        }
    }
}

/// State of one hint session.
#[derive(Clone, Debug)]
pub struct HintSession {
    generation: u64,
    options: HintOptions,
    targets: Vec<HintTarget>,
    by_target: HashMap<HintTarget, usize>,
    filter_index_map: Vec<usize>,
    current: usize,
    filter_text: String,
    focused: Option<HintTarget>,
}

impl HintSession {
    /// Build a session from per-frame candidate counts in frame-tree
    /// pre-order. `None` when there is nothing to hint.
    pub fn new(generation: u64, options: HintOptions, frames: &[(FrameId, usize)]) -> Option<Self> {
        let targets: Vec<HintTarget> = frames
            .iter()
            .flat_map(|&(frame_id, count)| {
                (0..count).map(move |local_index| HintTarget {
                    frame_id,
                    local_index,
                })
            })
            .collect();
        if targets.is_empty() {
            return None;
        }
        let by_target = targets.iter().enumerate().map(|(g, t)| (*t, g)).collect();
        Some(Self {
            generation,
            options,
            filter_index_map: (0..targets.len()).collect(),
            targets,
            by_target,
            current: 0,
            filter_text: String::new(),
            focused: None,
        })
    }

    /// Identifies this session across awaits.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// What the session collects for.
    pub fn kind(&self) -> HintKind {
        self.options.kind
    }

    /// Options the session was started with.
    pub fn options(&self) -> &HintOptions {
        &self.options
    }

    /// Total number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether there are no targets (never true for a built session).
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Owning frame of every global index.
    pub fn id_list(&self) -> Vec<FrameId> {
        self.targets.iter().map(|t| t.frame_id).collect()
    }

    /// Target at a global index.
    pub fn target(&self, global: usize) -> Option<HintTarget> {
        self.targets.get(global).copied()
    }

    /// Global index of a frame-local candidate.
    pub fn global_index(&self, target: HintTarget) -> Option<usize> {
        self.by_target.get(&target).copied()
    }

    /// Global indices each frame owns, frames in pre-order.
    pub fn assignments(&self) -> Vec<(FrameId, Vec<usize>)> {
        let mut out: Vec<(FrameId, Vec<usize>)> = Vec::new();
        for (global, target) in self.targets.iter().enumerate() {
            match out.last_mut() {
                Some((frame_id, globals)) if *frame_id == target.frame_id => globals.push(global),
                _ => out.push((target.frame_id, vec![global])),
            }
        }
        out
    }

    /// Frames owning at least one target, in pre-order.
    pub fn owners(&self) -> Vec<FrameId> {
        self.assignments().into_iter().map(|(f, _)| f).collect()
    }

    /// Display position to global index, ascending.
    pub fn filter_index_map(&self) -> &[usize] {
        &self.filter_index_map
    }

    /// Committed filter text.
    pub fn filter_text(&self) -> &str {
        &self.filter_text
    }

    /// Number of targets visible under the current filter.
    pub fn visible_count(&self) -> usize {
        self.filter_index_map.len()
    }

    /// Current display position.
    pub fn current_position(&self) -> usize {
        self.current
    }

    /// Target at the current display position.
    pub fn current_target(&self) -> Option<HintTarget> {
        self.filter_index_map
            .get(self.current)
            .and_then(|g| self.target(*g))
    }

    /// Target that currently holds the focus highlight.
    pub fn focused(&self) -> Option<HintTarget> {
        self.focused
    }

    /// Record which target already holds the highlight (after a rebuild).
    pub fn set_focused(&mut self, target: Option<HintTarget>) {
        self.focused = target;
    }

    /// Merge per-frame filter results into a new filter index map.
    ///
    /// Nothing matched: the previous map and text are kept. Otherwise the
    /// new map and text are committed and the position resets to 0.
    pub fn apply_filter(
        &mut self,
        text: &str,
        results: &[(FrameId, Vec<FilterMatch>)],
    ) -> Result<(), HintError> {
        let this = &*self;
        let mut matched: Vec<usize> = results
            .iter()
            .flat_map(|(frame_id, matches)| {
                matches.iter().filter(|m| m.matched).filter_map(move |m| {
                    this.global_index(HintTarget {
                        frame_id: *frame_id,
                        local_index: m.local_index,
                    })
                })
            })
            .collect();
        matched.sort_unstable();
        matched.dedup();

        if matched.is_empty() {
            return Err(HintError::NoMatch {
                text: text.to_string(),
            });
        }
        self.filter_index_map = matched;
        self.filter_text = text.to_string();
        self.current = 0;
        Ok(())
    }

    /// Drop the filter: every target visible again, position 0.
    pub fn clear_filter(&mut self) {
        self.filter_index_map = (0..self.targets.len()).collect();
        self.filter_text.clear();
        self.current = 0;
    }

    /// Display position reached by typing `digit` at the current position.
    ///
    /// The digit is appended to the current position's decimal string;
    /// while that number is not a visible position the leading digit is
    /// dropped. Nothing left means the last visible position.
    pub fn digit_position(&self, digit: char) -> Option<usize> {
        if !digit.is_ascii_digit() || self.filter_index_map.is_empty() {
            return None;
        }
        let visible = self.filter_index_map.len();
        let mut typed = format!("{}{digit}", self.current);
        loop {
            if typed.is_empty() {
                return Some(visible - 1);
            }
            match typed.parse::<usize>() {
                Ok(n) if n < visible => return Some(n),
                _ => {
                    let _ = typed.remove(0);
                }
            }
        }
    }

    /// Display position `steps` away from the current one, wrapping.
    pub fn step_position(&self, steps: isize) -> Option<usize> {
        let visible = isize::try_from(self.filter_index_map.len()).ok()?;
        if visible == 0 {
            return None;
        }
        let current = isize::try_from(self.current).ok()?;
        usize::try_from((current + steps).rem_euclid(visible)).ok()
    }

    /// Last visible display position.
    pub fn last_position(&self) -> Option<usize> {
        self.filter_index_map.len().checked_sub(1)
    }

    /// Display position of a global index, if visible.
    pub fn position_of(&self, global: usize) -> Option<usize> {
        self.filter_index_map.binary_search(&global).ok()
    }

    /// Move to `position` and return the messages that move the highlight.
    /// The previous target is blurred only if another frame owns it.
    pub fn change_focus(&mut self, position: usize) -> Option<FocusChange> {
        let global = *self.filter_index_map.get(position)?;
        let focus = self.target(global)?;
        let blur = self
            .focused
            .filter(|previous| previous.frame_id != focus.frame_id);
        self.current = position;
        self.focused = Some(focus);
        Some(FocusChange { blur, focus })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(counts: &[(u32, usize)]) -> Vec<(FrameId, usize)> {
        counts.iter().map(|&(f, c)| (FrameId(f), c)).collect()
    }

    fn options() -> HintOptions {
        HintOptions::from_settings(HintKind::Click, &HintSettings::default())
    }

    fn session(counts: &[(u32, usize)]) -> HintSession {
        HintSession::new(1, options(), &frames(counts)).unwrap()
    }

    fn matches(flags: &[bool]) -> Vec<FilterMatch> {
        flags
            .iter()
            .enumerate()
            .map(|(local_index, &matched)| FilterMatch {
                local_index,
                matched,
            })
            .collect()
    }

    #[test]
    fn options_use_configured_pattern() {
        let opts = HintOptions::from_settings(HintKind::NewTab, &HintSettings::default());
        assert_eq!(
            opts.collect_message(),
            CoordinatorToFrame::CollectHint {
                pattern: "a[href]".into(),
                area: None,
                kind: HintKind::NewTab,
            }
        );
    }

    #[test]
    fn id_list_follows_frame_order() {
        let s = session(&[(0, 2), (1, 3), (2, 0)]);
        assert_eq!(
            s.id_list(),
            vec![FrameId(0), FrameId(0), FrameId(1), FrameId(1), FrameId(1)]
        );
        assert_eq!(s.len(), 5);
        assert_eq!(
            s.target(3),
            Some(HintTarget {
                frame_id: FrameId(1),
                local_index: 1
            })
        );
        assert_eq!(s.owners(), vec![FrameId(0), FrameId(1)]);
    }

    #[test]
    fn empty_collection_is_no_session() {
        assert!(HintSession::new(1, options(), &frames(&[(0, 0), (1, 0)])).is_none());
    }

    #[test]
    fn assignments_are_per_frame_subsequences() {
        let s = session(&[(0, 2), (4, 1), (2, 2)]);
        assert_eq!(
            s.assignments(),
            vec![
                (FrameId(0), vec![0, 1]),
                (FrameId(4), vec![2]),
                (FrameId(2), vec![3, 4]),
            ]
        );
    }

    #[test]
    fn filter_is_sorted_and_idempotent() {
        let mut s = session(&[(0, 2), (1, 3)]);
        // replies arrive in any order
        let results = vec![
            (FrameId(1), matches(&[true, false, true])),
            (FrameId(0), matches(&[false, true])),
        ];
        s.apply_filter("ab", &results).unwrap();
        let first = s.filter_index_map().to_vec();
        assert_eq!(first, vec![1, 2, 4]);
        s.apply_filter("ab", &results).unwrap();
        assert_eq!(s.filter_index_map(), first.as_slice());
        assert_eq!(s.filter_text(), "ab");
    }

    #[test]
    fn zero_match_filter_keeps_previous_state() {
        let mut s = session(&[(0, 3)]);
        s.apply_filter("a", &[(FrameId(0), matches(&[true, false, true]))])
            .unwrap();
        let _ = s.change_focus(1);
        let err = s
            .apply_filter("zz", &[(FrameId(0), matches(&[false, false, false]))])
            .unwrap_err();
        assert_eq!(err, HintError::NoMatch { text: "zz".into() });
        assert_eq!(s.filter_index_map(), &[0, 2]);
        assert_eq!(s.filter_text(), "a");
        assert_eq!(s.current_position(), 1);
    }

    #[test]
    fn committed_filter_resets_position() {
        let mut s = session(&[(0, 3)]);
        let _ = s.change_focus(2);
        s.apply_filter("x", &[(FrameId(0), matches(&[true, true, false]))])
            .unwrap();
        assert_eq!(s.current_position(), 0);
        s.clear_filter();
        assert_eq!(s.filter_index_map(), &[0, 1, 2]);
        assert_eq!(s.filter_text(), "");
    }

    #[test]
    fn digit_input_appends_to_current_position() {
        let s = session(&[(0, 12)]);
        // "0" + "1" = 1
        assert_eq!(s.digit_position('1'), Some(1));
    }

    #[test]
    fn digit_input_drops_leading_digits() {
        let mut s = session(&[(0, 12)]);
        let _ = s.change_focus(1);
        // "15" is past the end, leaving "5"
        assert_eq!(s.digit_position('5'), Some(5));
        let _ = s.change_focus(1);
        // "11" is visible
        assert_eq!(s.digit_position('1'), Some(11));
    }

    #[test]
    fn digit_input_falls_back_to_last() {
        let s = session(&[(0, 1)]);
        // "05" -> "5" -> "" with a single visible target
        assert_eq!(s.digit_position('5'), Some(0));
        let s = session(&[(0, 5)]);
        assert_eq!(s.digit_position('9'), Some(4));
    }

    #[test]
    fn digit_input_counts_visible_targets_only() {
        let mut s = session(&[(0, 12)]);
        let flags: Vec<bool> = (0..12).map(|i| i % 2 == 0).collect();
        s.apply_filter("even", &[(FrameId(0), matches(&flags))]).unwrap();
        assert_eq!(s.visible_count(), 6);
        // "07" -> "7" -> "" with six visible
        assert_eq!(s.digit_position('7'), Some(5));
    }

    #[test]
    fn stepping_wraps() {
        let s = session(&[(0, 3)]);
        assert_eq!(s.step_position(-1), Some(2));
        assert_eq!(s.step_position(4), Some(1));
        assert_eq!(s.last_position(), Some(2));
    }

    #[test]
    fn blur_only_when_owner_changes() {
        let mut s = session(&[(0, 2), (1, 2)]);
        let first = s.change_focus(0).unwrap();
        assert_eq!(first.blur, None);
        let same_frame = s.change_focus(1).unwrap();
        assert_eq!(same_frame.blur, None);
        let other_frame = s.change_focus(2).unwrap();
        assert_eq!(
            other_frame.blur,
            Some(HintTarget {
                frame_id: FrameId(0),
                local_index: 1
            })
        );
        assert_eq!(other_frame.focus.frame_id, FrameId(1));
        assert_eq!(s.current_target(), Some(other_frame.focus));
    }

    #[test]
    fn focus_out_of_range_changes_nothing() {
        let mut s = session(&[(0, 2)]);
        assert!(s.change_focus(5).is_none());
        assert_eq!(s.current_position(), 0);
        assert_eq!(s.focused(), None);
    }
}
