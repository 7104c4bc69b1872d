//! Parent/child frame discovery.
//!
//! A child frame cannot see its parent's document, and a parent only sees
//! its children as opaque windows. Each child therefore announces its
//! [`FrameIdentity`] to the parent window with `registerChild`, repeating on
//! an interval until the parent acknowledges with `completeRegisterChild`.
//! The parent accepts announcements only from windows in its own child
//! list, which is what lets the coordinator walk the frame tree in document
//! order later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keynav_core::messages::WindowMessage;
use keynav_core::{FrameIdentity, WindowHandle};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The page's window-level messaging primitive, seen from one frame.
pub trait WindowHost: Send + Sync {
    /// This frame's parent window, `None` for a top-level document.
    fn parent_window(&self) -> Option<WindowHandle>;

    /// Windows of this frame's direct child frames, in document order.
    fn child_windows(&self) -> Vec<WindowHandle>;

    /// Post a message to `target`. Delivery is not acknowledged.
    fn post(&self, target: WindowHandle, message: WindowMessage);
}

/// One frame's view of its place in the frame tree.
pub struct FrameRegistry {
    identity: FrameIdentity,
    host: Arc<dyn WindowHost>,
    interval: Duration,
    top: bool,
    children: Mutex<HashMap<WindowHandle, FrameIdentity>>,
    registered: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl FrameRegistry {
    /// Registry for a frame that declared `identity`.
    pub fn new(identity: FrameIdentity, host: Arc<dyn WindowHost>, interval: Duration) -> Arc<Self> {
        let top = host.parent_window().is_none();
        let (registered, _) = watch::channel(top);
        Arc::new(Self {
            identity,
            host,
            interval,
            top,
            children: Mutex::new(HashMap::new()),
            registered,
            cancel: CancellationToken::new(),
        })
    }

    /// This frame's declared identity.
    pub fn identity(&self) -> FrameIdentity {
        self.identity
    }

    /// Whether this frame is the top-level document of its tab.
    pub fn is_top(&self) -> bool {
        self.top
    }

    /// Whether the parent acknowledged this frame (always true at the top).
    pub fn is_registered(&self) -> bool {
        *self.registered.borrow()
    }

    /// Start announcing to the parent until acknowledged. No-op at the top.
    pub fn start(self: &Arc<Self>) {
        let Some(parent) = self.host.parent_window() else {
            return;
        };
        let this = Arc::clone(self);
        let _ = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            let mut acked = this.registered.subscribe();
            loop {
                if *acked.borrow_and_update() {
                    debug!(identity = %this.identity, "registered with parent");
                    return;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        this.host.post(parent, WindowMessage::RegisterChild { identity: this.identity });
                    }
                    changed = acked.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    () = this.cancel.cancelled() => return,
                }
            }
        });
    }

    /// Wait until the parent acknowledges.
    pub async fn wait_registered(&self) {
        let mut rx = self.registered.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Handle a window message that arrived from `source`.
    pub fn handle_window_message(&self, source: WindowHandle, message: WindowMessage) {
        match message {
            WindowMessage::RegisterChild { identity } => {
                if !self.host.child_windows().contains(&source) {
                    warn!(%source, %identity, "registerChild from a window that is not a direct child, ignoring");
                    return;
                }
                let _ = self.children.lock().insert(source, identity);
                debug!(%source, %identity, "child frame registered");
                self.host
                    .post(source, WindowMessage::CompleteRegisterChild { identity });
            }
            WindowMessage::CompleteRegisterChild { identity } => {
                if self.host.parent_window() != Some(source) || identity != self.identity {
                    debug!(%source, %identity, "stray completeRegisterChild, ignoring");
                    return;
                }
                let _ = self.registered.send_replace(true);
            }
            WindowMessage::UnregisterChild { identity } => {
                let mut children = self.children.lock();
                if children.get(&source) == Some(&identity) {
                    let _ = children.remove(&source);
                    debug!(%source, %identity, "child frame unregistered");
                }
            }
        }
    }

    /// Identities of registered direct children, in document order.
    pub fn children_in_document_order(&self) -> Vec<FrameIdentity> {
        let children = self.children.lock();
        self.host
            .child_windows()
            .iter()
            .filter_map(|window| children.get(window).copied())
            .collect()
    }

    /// Stop announcing and tell the parent this frame is going away.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(parent) = self.host.parent_window() {
            self.host.post(
                parent,
                WindowMessage::UnregisterChild {
                    identity: self.identity,
                },
            );
        }
    }
}
