//! The process-wide coordinator: one [`TabContext`] per tab, fed by the
//! channels of every connected frame.

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use keynav_core::errors::{self, RemoteError};
use keynav_core::messages::{self, FrameToCoordinator, HintKind, RegisterReply};
use keynav_core::{FrameId, FrameIdentity, Mode, TabId};
use keynav_rpc::{Channel, WeakChannel, notification_fn, request_fn};
use keynav_settings::KeynavSettings;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::commands::{CommandContext, CommandRegistry};
use crate::console::{self, Resolution};
use crate::errors::CoordinatorError;
use crate::hint::HintOptions;
use crate::host::TabHost;
use crate::tab::TabContext;

/// One frame's channel, as the coordinator sees it.
struct Connection {
    tab_id: TabId,
    channel: WeakChannel,
    registered: OnceLock<(FrameId, FrameIdentity)>,
}

/// Routes frame messages to per-tab state and runs commands.
pub struct Coordinator {
    tabs: DashMap<TabId, Arc<TabContext>>,
    commands: CommandRegistry,
    host: Arc<dyn TabHost>,
    settings: RwLock<Arc<KeynavSettings>>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("tabs", &self.tabs.len())
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Coordinator with the built-in commands.
    pub fn new(settings: KeynavSettings, host: Arc<dyn TabHost>) -> Arc<Self> {
        Self::with_commands(settings, host, CommandRegistry::with_builtins())
    }

    /// Coordinator with a custom command registry.
    pub fn with_commands(settings: KeynavSettings, host: Arc<dyn TabHost>, commands: CommandRegistry) -> Arc<Self> {
        Arc::new(Self {
            tabs: DashMap::new(),
            commands,
            host,
            settings: RwLock::new(Arc::new(settings)),
        })
    }

    /// Registered commands.
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Settings in effect.
    pub fn settings(&self) -> Arc<KeynavSettings> {
        Arc::clone(&self.settings.read())
    }

    /// Replace the settings. Running hint sessions keep their options.
    pub fn apply_settings(&self, settings: KeynavSettings) {
        *self.settings.write() = Arc::new(settings);
        debug!("coordinator settings replaced");
    }

    /// Context of a tab with at least one registered frame.
    pub fn tab(&self, tab_id: &TabId) -> Option<Arc<TabContext>> {
        self.tabs.get(tab_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live tab contexts.
    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Serve a frame of `tab_id` over `channel`. The frame announces itself
    /// with `registerFrame`; when the channel closes its record goes away,
    /// and with the top frame the whole tab.
    pub fn connect_frame(self: &Arc<Self>, tab_id: TabId, channel: Channel) {
        let conn = Arc::new(Connection {
            tab_id,
            channel: channel.downgrade(),
            registered: OnceLock::new(),
        });
        install_handlers(&channel, Arc::downgrade(self), &conn);

        let weak = Arc::downgrade(self);
        let _ = tokio::spawn(async move {
            channel.closed().await;
            if let Some(coordinator) = weak.upgrade() {
                coordinator.frame_closed(&conn);
            }
        });
    }

    fn frame_closed(&self, conn: &Connection) {
        let Some(&(frame_id, identity)) = conn.registered.get() else {
            debug!(tab = %conn.tab_id, "unregistered channel closed");
            return;
        };
        let Some(tab) = self.tab(&conn.tab_id) else {
            return;
        };
        if !tab.remove_frame(frame_id, identity) || !frame_id.is_top() {
            return;
        }
        if self
            .tabs
            .remove_if(&conn.tab_id, |_, current| Arc::ptr_eq(current, &tab))
            .is_some()
        {
            info!(tab = %conn.tab_id, "top frame gone, tab context dropped");
        }
    }

    fn registered(&self, conn: &Connection) -> Result<(Arc<TabContext>, FrameId), CoordinatorError> {
        let &(frame_id, _) = conn.registered.get().ok_or(CoordinatorError::NotRegistered)?;
        let tab = self
            .tab(&conn.tab_id)
            .ok_or_else(|| CoordinatorError::TabNotFound(conn.tab_id.clone()))?;
        Ok((tab, frame_id))
    }

    fn register(&self, conn: &Connection, identity: FrameIdentity, is_top: bool) -> Result<Value, CoordinatorError> {
        if let Some(&(frame_id, previous)) = conn.registered.get() {
            warn!(tab = %conn.tab_id, %frame_id, %identity, %previous, "frame registered twice on one channel");
            return Ok(messages::encode(&RegisterReply { frame_id })?);
        }
        let channel = conn
            .channel
            .upgrade()
            .ok_or(CoordinatorError::FrameDisconnected { frame_id: FrameId::TOP })?;
        let tab = Arc::clone(
            self.tabs
                .entry(conn.tab_id.clone())
                .or_insert_with(|| Arc::new(TabContext::new(conn.tab_id.clone())))
                .value(),
        );
        let frame_id = tab.register_frame(identity, is_top, channel);
        let _ = conn.registered.set((frame_id, identity));
        Ok(messages::encode(&RegisterReply { frame_id })?)
    }

    #[instrument(skip_all, fields(tab = %conn.tab_id))]
    async fn dispatch(&self, conn: &Connection, message: FrameToCoordinator) -> Result<Value, CoordinatorError> {
        if let FrameToCoordinator::RegisterFrame { identity, is_top } = message {
            return self.register(conn, identity, is_top);
        }
        let (tab, frame_id) = self.registered(conn)?;
        let result = match message {
            FrameToCoordinator::RegisterFrame { .. } => Ok(()),
            FrameToCoordinator::Command { command, count } => {
                self.execute(&tab, frame_id, &command, count, "").await
            }
            FrameToCoordinator::RequestMode { mode: Mode::Hint, .. } => {
                let options = HintOptions::from_settings(HintKind::Click, &self.settings().hint);
                tab.start_hints(options).await
            }
            FrameToCoordinator::RequestMode { mode, data } => {
                tab.change_mode(mode, Some(frame_id), data);
                Ok(())
            }
            FrameToCoordinator::HintKey { token } => tab.hint_key(&token).await,
            FrameToCoordinator::HintFilter { text } => tab.hint_filter(&text).await,
            FrameToCoordinator::ConsoleCommand { line } => self.run_console(&tab, frame_id, &line).await,
        };
        if let Err(e) = &result {
            if e.is_user_visible() {
                tab.show_message(e.to_string());
            }
        }
        result.map(|()| Value::Null)
    }

    /// Run command `name` in `tab` as if `frame_id` had sent it.
    #[instrument(skip_all, fields(tab = %tab.tab_id(), %frame_id, command = name))]
    pub async fn execute(
        &self,
        tab: &TabContext,
        frame_id: FrameId,
        name: &str,
        count: Option<u32>,
        args: &str,
    ) -> Result<(), CoordinatorError> {
        let handler = self
            .commands
            .get(name)
            .ok_or_else(|| CoordinatorError::UnknownCommand(name.to_string()))?;
        let settings = self.settings();
        debug!(?count, "running command");
        handler
            .run(CommandContext {
                tab,
                frame_id,
                count,
                args,
                host: self.host.as_ref(),
                settings: &settings,
            })
            .await
    }

    /// Resolve and run a console line. The console closes first.
    pub async fn run_console(&self, tab: &TabContext, frame_id: FrameId, line: &str) -> Result<(), CoordinatorError> {
        if tab.mode() == Mode::Console {
            tab.change_mode(Mode::Default, None, None);
        }
        let Some(parsed) = console::parse_line(line) else {
            return Ok(());
        };
        let names = self.commands.names();
        let name = match console::resolve(&names, &parsed.name) {
            Resolution::Exact(name) | Resolution::Prefix(name) => name,
            Resolution::Ambiguous(candidates) => {
                return Err(CoordinatorError::AmbiguousCommand {
                    input: parsed.name,
                    candidates,
                });
            }
            Resolution::Unknown => return Err(CoordinatorError::UnknownCommand(parsed.name)),
        };
        self.execute(tab, frame_id, &name, parsed.count, &parsed.args).await
    }
}

fn install_handlers(channel: &Channel, coordinator: Weak<Coordinator>, conn: &Arc<Connection>) {
    let weak = coordinator.clone();
    let request_conn = Arc::clone(conn);
    channel.on_request(request_fn(move |payload| {
        let coordinator = weak.upgrade();
        let conn = Arc::clone(&request_conn);
        async move {
            let coordinator = coordinator.ok_or_else(coordinator_gone)?;
            let message = messages::decode(payload)?;
            Ok(coordinator.dispatch(&conn, message).await?)
        }
    }));

    let notify_conn = Arc::clone(conn);
    channel.on_notification(notification_fn(move |payload| {
        let coordinator = coordinator.upgrade();
        let conn = Arc::clone(&notify_conn);
        async move {
            let coordinator = coordinator.ok_or_else(coordinator_gone)?;
            let message = messages::decode(payload)?;
            notification_outcome(coordinator.dispatch(&conn, message).await)
        }
    }));
}

/// What the channel sees of a handled notification. Errors already shown
/// to the user and hint input that changed nothing are not failures.
fn notification_outcome(result: Result<Value, CoordinatorError>) -> Result<(), RemoteError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_user_visible() => Ok(()),
        Err(CoordinatorError::Hint(e)) => {
            debug!(error = %e, "hint input had no effect");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn coordinator_gone() -> RemoteError {
    RemoteError::new(errors::INTERNAL_ERROR, "coordinator dropped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use keynav_core::messages::CoordinatorToFrame;
    use keynav_rpc::{ChannelConfig, MemoryTransport};
    use parking_lot::Mutex;

    use crate::errors::HostError;

    #[derive(Default)]
    struct NullHost {
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TabHost for NullHost {
        async fn next_tab(&self, _tab: &TabId, _count: u32) -> Result<(), HostError> {
            Ok(())
        }
        async fn prev_tab(&self, _tab: &TabId, _count: u32) -> Result<(), HostError> {
            Ok(())
        }
        async fn close_tab(&self, _tab: &TabId) -> Result<(), HostError> {
            Ok(())
        }
        async fn reload_tab(&self, _tab: &TabId) -> Result<(), HostError> {
            Ok(())
        }
        async fn history_back(&self, _tab: &TabId, _count: u32) -> Result<(), HostError> {
            Ok(())
        }
        async fn history_forward(&self, _tab: &TabId, _count: u32) -> Result<(), HostError> {
            Ok(())
        }
        async fn open_url(&self, _tab: &TabId, url: &str) -> Result<(), HostError> {
            self.opened.lock().push(url.to_string());
            Ok(())
        }
    }

    /// A frame end that records what the coordinator sends it.
    struct FakeFrame {
        channel: Channel,
        received: Arc<Mutex<Vec<CoordinatorToFrame>>>,
    }

    impl FakeFrame {
        fn connect(coordinator: &Arc<Coordinator>, tab_id: &TabId) -> Self {
            let (frame_end, coord_end) = MemoryTransport::pair();
            coordinator.connect_frame(tab_id.clone(), Channel::open("coordinator", coord_end, ChannelConfig::default()));
            let channel = Channel::open("frame", frame_end, ChannelConfig::default());
            let received = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&received);
            channel.on_notification(notification_fn(move |payload| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push(messages::decode(payload)?);
                    Ok(())
                }
            }));
            Self { channel, received }
        }

        async fn register(&self, identity: u32, is_top: bool) -> FrameId {
            let reply: RegisterReply = self
                .channel
                .request_as(&FrameToCoordinator::RegisterFrame {
                    identity: FrameIdentity(identity),
                    is_top,
                })
                .await
                .unwrap();
            reply.frame_id
        }

        async fn wait_for(&self, predicate: impl Fn(&CoordinatorToFrame) -> bool) -> bool {
            for _ in 0..100 {
                if self.received.lock().iter().any(&predicate) {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            false
        }
    }

    fn coordinator() -> (Arc<Coordinator>, Arc<NullHost>) {
        let host = Arc::new(NullHost::default());
        (Coordinator::new(KeynavSettings::default(), host.clone()), host)
    }

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn registration_assigns_ids_per_tab() {
        let (coordinator, _) = coordinator();
        let tab_a = TabId::new();
        let tab_b = TabId::new();
        let top_a = FakeFrame::connect(&coordinator, &tab_a);
        let child_a = FakeFrame::connect(&coordinator, &tab_a);
        let top_b = FakeFrame::connect(&coordinator, &tab_b);

        assert_eq!(top_a.register(1, true).await, FrameId::TOP);
        assert_eq!(child_a.register(2, false).await, FrameId(1));
        assert_eq!(top_b.register(3, true).await, FrameId::TOP);
        assert_eq!(coordinator.tab_count(), 2);
        assert_eq!(coordinator.tab(&tab_a).unwrap().frame_count(), 2);
    }

    #[tokio::test]
    async fn message_before_registration_is_rejected() {
        let (coordinator, _) = coordinator();
        let frame = FakeFrame::connect(&coordinator, &TabId::new());
        let err = frame
            .channel
            .request_as::<_, Value>(&FrameToCoordinator::HintFilter { text: "a".into() })
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(errors::INVALID_OPERATION));
    }

    #[tokio::test]
    async fn request_mode_notifies_every_frame() {
        let (coordinator, _) = coordinator();
        let tab_id = TabId::new();
        let top = FakeFrame::connect(&coordinator, &tab_id);
        let child = FakeFrame::connect(&coordinator, &tab_id);
        let _ = top.register(1, true).await;
        let _ = child.register(2, false).await;

        child
            .channel
            .notify_as(&FrameToCoordinator::RequestMode {
                mode: Mode::Insert,
                data: Some(serde_json::json!({"field": 3})),
            })
            .unwrap();

        assert!(
            child
                .wait_for(|m| matches!(m, CoordinatorToFrame::ChangeMode { mode: Mode::Insert, target: true, data: Some(_) }))
                .await
        );
        assert!(
            top.wait_for(|m| matches!(m, CoordinatorToFrame::ChangeMode { mode: Mode::Insert, target: false, data: None }))
                .await
        );
        assert_eq!(coordinator.tab(&tab_id).unwrap().mode(), Mode::Insert);
    }

    #[tokio::test]
    async fn unknown_command_shows_message() {
        let (coordinator, _) = coordinator();
        let top = FakeFrame::connect(&coordinator, &TabId::new());
        let _ = top.register(1, true).await;
        top.channel
            .notify_as(&FrameToCoordinator::Command {
                command: "launchRockets".into(),
                count: None,
            })
            .unwrap();
        assert!(
            top.wait_for(|m| matches!(m, CoordinatorToFrame::ShowMessage { text } if text == "unknown command 'launchRockets'"))
                .await
        );
    }

    #[tokio::test]
    async fn console_runs_prefix_with_args_and_closes() {
        let (coordinator, host) = coordinator();
        let tab_id = TabId::new();
        let top = FakeFrame::connect(&coordinator, &tab_id);
        let _ = top.register(1, true).await;
        let tab = coordinator.tab(&tab_id).unwrap();
        tab.change_mode(Mode::Console, None, None);

        coordinator
            .run_console(&tab, FrameId::TOP, "op https://example.com")
            .await
            .unwrap();
        assert_eq!(*host.opened.lock(), vec!["https://example.com"]);
        assert_eq!(tab.mode(), Mode::Default);
    }

    #[tokio::test]
    async fn console_ambiguity_lists_candidates() {
        let (coordinator, _) = coordinator();
        let tab = TabContext::new(TabId::new());
        let err = coordinator
            .run_console(&tab, FrameId::TOP, "enterHint")
            .await
            .unwrap_err();
        assert_matches!(err, CoordinatorError::AmbiguousCommand { ref candidates, .. } if candidates.len() == 3);
        assert_matches!(
            coordinator.run_console(&tab, FrameId::TOP, "fly").await,
            Err(CoordinatorError::UnknownCommand(name)) if name == "fly"
        );
        assert!(coordinator.run_console(&tab, FrameId::TOP, "  ").await.is_ok());
    }

    #[tokio::test]
    async fn child_disconnect_keeps_tab_top_disconnect_drops_it() {
        let (coordinator, _) = coordinator();
        let tab_id = TabId::new();
        let top = FakeFrame::connect(&coordinator, &tab_id);
        let child = FakeFrame::connect(&coordinator, &tab_id);
        let _ = top.register(1, true).await;
        let child_id = child.register(2, false).await;

        child.channel.disconnect();
        let tab = coordinator.tab(&tab_id).unwrap();
        assert!(eventually(|| tab.frame_count() == 1).await);
        assert_matches!(
            tab.notify(child_id, &CoordinatorToFrame::GetTargetIndex),
            Err(CoordinatorError::FrameDisconnected { .. })
        );
        assert_eq!(coordinator.tab_count(), 1);

        top.channel.disconnect();
        assert!(eventually(|| coordinator.tab_count() == 0).await);
    }

    #[test]
    fn expected_hint_outcomes_are_not_notification_failures() {
        let no_match = CoordinatorError::from(crate::errors::HintError::NoMatch { text: "zz".into() });
        assert!(notification_outcome(Err(no_match)).is_ok());
        let inactive = CoordinatorError::from(crate::errors::HintError::NotActive);
        assert!(notification_outcome(Err(inactive)).is_ok());
        assert!(notification_outcome(Err(CoordinatorError::UnknownCommand("x".into()))).is_ok());

        let err = notification_outcome(Err(CoordinatorError::NotRegistered)).unwrap_err();
        assert_eq!(err.code, errors::INVALID_OPERATION);
    }

    #[tokio::test]
    async fn settings_are_replaced_wholesale() {
        let (coordinator, _) = coordinator();
        let mut settings = KeynavSettings::default();
        settings.hint.autofocus = !settings.hint.autofocus;
        let expected = settings.hint.autofocus;
        coordinator.apply_settings(settings);
        assert_eq!(coordinator.settings().hint.autofocus, expected);
    }
}
