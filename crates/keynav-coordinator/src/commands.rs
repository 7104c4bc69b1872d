//! Command registry and the built-in coordinator commands.
//!
//! Frames forward every bound command they cannot run against their own
//! document. The coordinator looks the name up here and runs it with the
//! tab, the originating frame and the repeat count.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use keynav_core::messages::HintKind;
use keynav_core::{FrameId, Mode};
use keynav_settings::KeynavSettings;

use crate::errors::CoordinatorError;
use crate::hint::{HintMove, HintOptions};
use crate::host::TabHost;
use crate::tab::TabContext;

/// Everything a command sees while it runs.
pub struct CommandContext<'a> {
    /// The tab the command runs in.
    pub tab: &'a TabContext,
    /// Frame the command came from.
    pub frame_id: FrameId,
    /// Repeat count typed before the command, if any.
    pub count: Option<u32>,
    /// Argument text (console commands only).
    pub args: &'a str,
    /// Tab and history API.
    pub host: &'a dyn TabHost,
    /// Settings in effect.
    pub settings: &'a KeynavSettings,
}

impl CommandContext<'_> {
    /// The repeat count, 1 when none was typed.
    pub fn count_or_one(&self) -> u32 {
        self.count.unwrap_or(1).max(1)
    }
}

/// A named coordinator command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command.
    async fn run(&self, ctx: CommandContext<'_>) -> Result<(), CoordinatorError>;
}

/// Commands every coordinator knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    /// Hint clickable elements.
    EnterHintMode(HintKind),
    /// Switch to visual mode.
    EnterVisualMode,
    /// Open the console.
    EnterConsoleMode,
    /// Back to default mode.
    Escape,
    /// Move hint focus.
    HintMove(HintMove),
    /// Run the hint kind's action on the focused target and leave hint mode.
    HintSelect,
    /// Open the focused target in a new tab and stay in hint mode.
    HintOpenInTab,
    /// Re-collect hints after the page changed.
    HintReconstruct,
    /// Activate the next tab.
    NextTab,
    /// Activate the previous tab.
    PrevTab,
    /// Close the tab.
    CloseTab,
    /// Reload the tab.
    ReloadTab,
    /// Go back in history.
    HistoryBack,
    /// Go forward in history.
    HistoryForward,
    /// Open the argument as a URL in a new tab.
    Open,
}

impl Builtin {
    /// Every built-in with its command name.
    pub const ALL: &'static [(&'static str, Builtin)] = &[
        ("enterHintMode", Self::EnterHintMode(HintKind::Click)),
        ("enterHintModeNewTab", Self::EnterHintMode(HintKind::NewTab)),
        ("enterHintModeFocus", Self::EnterHintMode(HintKind::Focus)),
        ("enterVisualMode", Self::EnterVisualMode),
        ("enterConsoleMode", Self::EnterConsoleMode),
        ("escape", Self::Escape),
        ("hintNext", Self::HintMove(HintMove::Next)),
        ("hintPrev", Self::HintMove(HintMove::Prev)),
        ("hintFirst", Self::HintMove(HintMove::First)),
        ("hintLast", Self::HintMove(HintMove::Last)),
        ("hintSelect", Self::HintSelect),
        ("hintOpenInTab", Self::HintOpenInTab),
        ("hintReconstruct", Self::HintReconstruct),
        ("nextTab", Self::NextTab),
        ("prevTab", Self::PrevTab),
        ("closeTab", Self::CloseTab),
        ("reloadTab", Self::ReloadTab),
        ("historyBack", Self::HistoryBack),
        ("historyForward", Self::HistoryForward),
        ("open", Self::Open),
    ];
}

#[async_trait]
impl CommandHandler for Builtin {
    async fn run(&self, ctx: CommandContext<'_>) -> Result<(), CoordinatorError> {
        let tab = ctx.tab;
        let count = ctx.count_or_one();
        match *self {
            Self::EnterHintMode(kind) => {
                tab.start_hints(HintOptions::from_settings(kind, &ctx.settings.hint))
                    .await
            }
            Self::EnterVisualMode => {
                tab.change_mode(Mode::Visual, Some(ctx.frame_id), None);
                Ok(())
            }
            Self::EnterConsoleMode => {
                tab.change_mode(Mode::Console, Some(ctx.frame_id), None);
                Ok(())
            }
            Self::Escape => {
                tab.change_mode(Mode::Default, None, None);
                Ok(())
            }
            Self::HintMove(movement) => tab.hint_move(movement, count).await,
            Self::HintSelect => {
                let kind = tab
                    .hint_session()
                    .map_or(HintKind::Click, |session| session.kind());
                tab.forward_hint_command(kind.element_command(), count)?;
                tab.close_hints();
                Ok(())
            }
            Self::HintOpenInTab => {
                tab.forward_hint_command(HintKind::NewTab.element_command(), count)
            }
            Self::HintReconstruct => tab.reconstruct_hints().await,
            Self::NextTab => Ok(ctx.host.next_tab(tab.tab_id(), count).await?),
            Self::PrevTab => Ok(ctx.host.prev_tab(tab.tab_id(), count).await?),
            Self::CloseTab => Ok(ctx.host.close_tab(tab.tab_id()).await?),
            Self::ReloadTab => Ok(ctx.host.reload_tab(tab.tab_id()).await?),
            Self::HistoryBack => Ok(ctx.host.history_back(tab.tab_id(), count).await?),
            Self::HistoryForward => Ok(ctx.host.history_forward(tab.tab_id(), count).await?),
            Self::Open => {
                let url = ctx.args.trim();
                if url.is_empty() {
                    return Err(CoordinatorError::MissingArgument {
                        command: "open".into(),
                    });
                }
                Ok(ctx.host.open_url(tab.tab_id(), url).await?)
            }
        }
    }
}

/// Command names mapped to handlers.
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry holding every [`Builtin`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, builtin) in Builtin::ALL {
            registry.register(name, *builtin);
        }
        registry
    }

    /// Register a handler, replacing any previous one of the same name.
    pub fn register(&mut self, name: &str, handler: impl CommandHandler + 'static) {
        let _ = self.handlers.insert(name.to_owned(), Arc::new(handler));
    }

    /// Handler for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(name).cloned()
    }

    /// All registered names (sorted).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a command is registered.
    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use keynav_core::TabId;
    use keynav_settings::KeymapSettings;
    use parking_lot::Mutex;

    use crate::errors::{HintError, HostError};

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TabHost for RecordingHost {
        async fn next_tab(&self, _tab: &TabId, count: u32) -> Result<(), HostError> {
            self.calls.lock().push(format!("next {count}"));
            Ok(())
        }
        async fn prev_tab(&self, _tab: &TabId, count: u32) -> Result<(), HostError> {
            self.calls.lock().push(format!("prev {count}"));
            Ok(())
        }
        async fn close_tab(&self, _tab: &TabId) -> Result<(), HostError> {
            Err(HostError("pinned tab".into()))
        }
        async fn reload_tab(&self, _tab: &TabId) -> Result<(), HostError> {
            self.calls.lock().push("reload".into());
            Ok(())
        }
        async fn history_back(&self, _tab: &TabId, count: u32) -> Result<(), HostError> {
            self.calls.lock().push(format!("back {count}"));
            Ok(())
        }
        async fn history_forward(&self, _tab: &TabId, count: u32) -> Result<(), HostError> {
            self.calls.lock().push(format!("forward {count}"));
            Ok(())
        }
        async fn open_url(&self, _tab: &TabId, url: &str) -> Result<(), HostError> {
            self.calls.lock().push(format!("open {url}"));
            Ok(())
        }
    }

    async fn run(name: &str, count: Option<u32>, args: &str, tab: &TabContext, host: &RecordingHost) -> Result<(), CoordinatorError> {
        let registry = CommandRegistry::with_builtins();
        let settings = KeynavSettings::default();
        let handler = registry.get(name).unwrap();
        handler
            .run(CommandContext {
                tab,
                frame_id: FrameId::TOP,
                count,
                args,
                host,
                settings: &settings,
            })
            .await
    }

    #[test]
    fn default_keymaps_only_use_known_commands() {
        let registry = CommandRegistry::with_builtins();
        let frame_local = ["scrollDown", "scrollUp", "scrollLeft", "scrollRight", "scrollPageDown", "scrollPageUp", "scrollTop", "scrollBottom", "focusInput"];
        let keymaps = KeymapSettings::default();
        for mode in Mode::ALL {
            for command in keymaps.for_mode(mode).values() {
                assert!(
                    registry.has(command) || frame_local.contains(&command.as_str()),
                    "{command} is bound but unknown"
                );
            }
        }
    }

    #[test]
    fn names_are_sorted() {
        let names = CommandRegistry::with_builtins().names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), Builtin::ALL.len());
    }

    #[test]
    fn register_replaces() {
        let mut registry = CommandRegistry::new();
        assert!(!registry.has("escape"));
        registry.register("escape", Builtin::EnterVisualMode);
        registry.register("escape", Builtin::Escape);
        assert_eq!(registry.names(), vec!["escape".to_string()]);
    }

    #[tokio::test]
    async fn host_commands_receive_count() {
        let tab = TabContext::new(TabId::new());
        let host = RecordingHost::default();
        run("nextTab", Some(3), "", &tab, &host).await.unwrap();
        run("historyBack", None, "", &tab, &host).await.unwrap();
        run("reloadTab", Some(5), "", &tab, &host).await.unwrap();
        assert_eq!(*host.calls.lock(), vec!["next 3", "back 1", "reload"]);
    }

    #[tokio::test]
    async fn host_failure_is_reported() {
        let tab = TabContext::new(TabId::new());
        let host = RecordingHost::default();
        let err = run("closeTab", None, "", &tab, &host).await.unwrap_err();
        assert_matches!(err, CoordinatorError::Host(HostError(ref m)) if m == "pinned tab");
        assert!(err.is_user_visible());
    }

    #[tokio::test]
    async fn open_needs_a_url() {
        let tab = TabContext::new(TabId::new());
        let host = RecordingHost::default();
        assert_matches!(
            run("open", None, "  ", &tab, &host).await,
            Err(CoordinatorError::MissingArgument { command }) if command == "open"
        );
        run("open", None, " https://example.com ", &tab, &host).await.unwrap();
        assert_eq!(*host.calls.lock(), vec!["open https://example.com"]);
    }

    #[tokio::test]
    async fn mode_commands_switch_mode() {
        let tab = TabContext::new(TabId::new());
        let host = RecordingHost::default();
        run("enterVisualMode", None, "", &tab, &host).await.unwrap();
        assert_eq!(tab.mode(), Mode::Visual);
        run("escape", None, "", &tab, &host).await.unwrap();
        assert_eq!(tab.mode(), Mode::Default);
    }

    #[tokio::test]
    async fn hint_commands_need_a_session() {
        let tab = TabContext::new(TabId::new());
        let host = RecordingHost::default();
        assert_matches!(
            run("hintNext", None, "", &tab, &host).await,
            Err(CoordinatorError::Hint(HintError::NotActive))
        );
        assert_matches!(
            run("hintSelect", None, "", &tab, &host).await,
            Err(CoordinatorError::Hint(HintError::NotActive))
        );
    }
}
