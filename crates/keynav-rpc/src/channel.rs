//! Multiplexed request/response channel.
//!
//! A [`Channel`] wraps one [`Endpoint`] and runs three tasks:
//!
//! - the receive loop: settles responses, spawns request dispatch, queues
//!   notifications
//! - the inbound worker: delivers notifications in arrival order
//! - the liveness sweep: rejects requests left unanswered across two sweeps
//!
//! Requests run concurrently by default, so a notification handler may
//! itself issue requests on the same channel without blocking the responses
//! it awaits. An [ordered](ChannelConfig::ordered) channel instead queues
//! requests behind notifications and answers them one at a time; its
//! handlers must never wait on the peer's handlers.
//! Teardown (explicit [`Channel::disconnect`], the peer closing, or the last
//! handle dropping) cancels all three and fails every pending request.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::join_all;
use keynav_core::errors::RemoteError;
use keynav_core::messages;
use keynav_settings::ChannelSettings;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::envelope::Envelope;
use crate::errors::ChannelError;
use crate::handler::{NotificationHandler, RequestHandler, first_settled};
use crate::pending::{PendingTable, TransactionIds};
use crate::transport::{Endpoint, Transport};

/// Channel tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Liveness sweep period.
    pub sweep_interval: Duration,
    /// Handle requests on the inbound worker, in arrival order with
    /// notifications.
    pub ordered: bool,
}

impl ChannelConfig {
    /// Same config with requests handled in arrival order.
    #[must_use]
    pub fn ordered(self) -> Self {
        Self {
            ordered: true,
            ..self
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from(&ChannelSettings::default())
    }
}

impl From<&ChannelSettings> for ChannelConfig {
    fn from(settings: &ChannelSettings) -> Self {
        Self {
            sweep_interval: Duration::from_millis(settings.sweep_interval_ms.max(1)),
            ordered: false,
        }
    }
}

struct Inner {
    name: String,
    transport: Arc<dyn Transport>,
    ids: TransactionIds,
    pending: PendingTable,
    request_handlers: RwLock<Vec<Arc<dyn RequestHandler>>>,
    notification_handlers: RwLock<Vec<Arc<dyn NotificationHandler>>>,
    inbound: mpsc::UnboundedSender<Inbound>,
    ordered: bool,
    cancel: CancellationToken,
}

/// Work for the inbound worker.
enum Inbound {
    Notification(Value),
    Request { id: u64, payload: Value },
}

impl Inner {
    fn post(&self, envelope: &Envelope) -> Result<(), ChannelError> {
        let value = serde_json::to_value(envelope).map_err(keynav_core::MessageError::from)?;
        self.transport.post(value)?;
        Ok(())
    }

    fn teardown(&self, reason: &str) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        self.transport.close();
        let failed = self.pending.fail_all();
        debug!(channel = %self.name, reason, failed, "channel torn down");
    }

    #[instrument(skip_all, fields(channel = %self.name))]
    fn dispatch(&self, message: Value) {
        let envelope: Envelope = match serde_json::from_value(message) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed envelope");
                return;
            }
        };

        match envelope {
            Envelope::Request { id, payload } if self.ordered => {
                if self.inbound.send(Inbound::Request { id, payload }).is_err() {
                    debug!(id, "inbound worker gone, dropping request");
                }
            }
            Envelope::Request { id, payload } => {
                let _ = tokio::spawn(self.respond(id, payload));
            }
            Envelope::Response { id, ok, payload } => {
                let result = if ok {
                    Ok(payload)
                } else {
                    Err(ChannelError::Rejected(RemoteError::from_value(payload)))
                };
                if !self.pending.settle(id, result) {
                    debug!(id, "response for unknown transaction, dropping");
                }
            }
            Envelope::Notification { payload } => {
                if self.inbound.send(Inbound::Notification(payload)).is_err() {
                    debug!("inbound worker gone, dropping notification");
                }
            }
        }
    }

    /// Run the request handlers on `payload` and post the response.
    fn respond(&self, id: u64, payload: Value) -> impl Future<Output = ()> + Send + use<> {
        let handlers = self.request_handlers.read().clone();
        let transport = Arc::clone(&self.transport);
        let name = self.name.clone();
        async move {
            let response = match first_settled(handlers, payload).await {
                Ok(payload) => Envelope::Response { id, ok: true, payload },
                Err(err) => {
                    debug!(channel = %name, id, error = %err, "request rejected");
                    Envelope::Response {
                        id,
                        ok: false,
                        payload: err.to_value(),
                    }
                }
            };
            let sent = serde_json::to_value(&response)
                .map_err(|e| e.to_string())
                .and_then(|v| transport.post(v).map_err(|e| e.to_string()));
            if let Err(e) = sent {
                debug!(channel = %name, id, error = %e, "response not delivered");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.teardown("dropped");
    }
}

/// One side of a request/response connection. Cheap to clone.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("connected", &self.is_connected())
            .field("pending", &self.inner.pending.len())
            .finish()
    }
}

impl Channel {
    /// Start a channel over `endpoint`. Must be called inside a tokio runtime.
    pub fn open(name: impl Into<String>, endpoint: Endpoint, config: ChannelConfig) -> Self {
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            name: name.into(),
            transport: endpoint.transport,
            ids: TransactionIds::new(),
            pending: PendingTable::new(),
            request_handlers: RwLock::new(Vec::new()),
            notification_handlers: RwLock::new(Vec::new()),
            inbound: notify_tx,
            ordered: config.ordered,
            cancel: CancellationToken::new(),
        });

        let cancel = inner.cancel.clone();
        let _ = tokio::spawn(receive_loop(
            Arc::downgrade(&inner),
            endpoint.inbound,
            cancel.clone(),
        ));
        let _ = tokio::spawn(inbound_loop(
            Arc::downgrade(&inner),
            notify_rx,
            cancel.clone(),
        ));
        let _ = tokio::spawn(sweep_loop(
            Arc::downgrade(&inner),
            config.sweep_interval,
            cancel,
        ));
        debug!(channel = %inner.name, "channel opened");

        Self { inner }
    }

    /// Label used in logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether teardown has not happened yet.
    pub fn is_connected(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Register a request handler. All handlers race on every request.
    pub fn on_request(&self, handler: Arc<dyn RequestHandler>) {
        self.inner.request_handlers.write().push(handler);
    }

    /// Register a notification handler.
    pub fn on_notification(&self, handler: Arc<dyn NotificationHandler>) {
        self.inner.notification_handlers.write().push(handler);
    }

    /// Send a request and wait for its response.
    pub async fn request(&self, payload: Value) -> Result<Value, ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        let id = self.inner.ids.next_id();
        let rx = self.inner.pending.insert(id);
        if !self.is_connected() {
            self.inner.pending.remove(id);
            return Err(ChannelError::Disconnected);
        }
        if let Err(e) = self.inner.post(&Envelope::Request { id, payload }) {
            self.inner.pending.remove(id);
            return Err(e);
        }
        rx.await.unwrap_or(Err(ChannelError::Disconnected))
    }

    /// Send a fire-and-forget notification.
    pub fn notify(&self, payload: Value) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        self.inner.post(&Envelope::Notification { payload })
    }

    /// Encode `message`, send it as a request, decode the reply.
    pub async fn request_as<M, R>(&self, message: &M) -> Result<R, ChannelError>
    where
        M: Serialize + Sync,
        R: DeserializeOwned,
    {
        let reply = self.request(messages::encode(message)?).await?;
        Ok(messages::decode(reply)?)
    }

    /// Encode `message` and send it as a notification.
    pub fn notify_as<M: Serialize>(&self, message: &M) -> Result<(), ChannelError> {
        self.notify(messages::encode(message)?)
    }

    /// Tear the channel down: stop all tasks, close the transport, fail
    /// pending requests with [`ChannelError::Disconnected`].
    pub fn disconnect(&self) {
        self.inner.teardown("disconnect");
    }

    /// Resolves once the channel has been torn down, by either side.
    pub async fn closed(&self) {
        let token = self.inner.cancel.clone();
        token.cancelled().await;
    }

    /// Handle that does not keep the channel alive, for use inside the
    /// channel's own handlers.
    pub fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning [`Channel`] handle.
#[derive(Clone, Debug)]
pub struct WeakChannel {
    inner: Weak<Inner>,
}

impl WeakChannel {
    /// The channel, if any handle to it is still alive.
    pub fn upgrade(&self) -> Option<Channel> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }
}

async fn receive_loop(
    inner: Weak<Inner>,
    mut inbound: mpsc::UnboundedReceiver<Value>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => return,
            message = inbound.recv() => message,
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match message {
            Some(message) => inner.dispatch(message),
            None => {
                inner.teardown("peer closed");
                return;
            }
        }
    }
}

async fn inbound_loop(
    inner: Weak<Inner>,
    mut queue: mpsc::UnboundedReceiver<Inbound>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            () = cancel.cancelled() => return,
            item = queue.recv() => item,
        };
        let payload = match item {
            Some(Inbound::Notification(payload)) => payload,
            Some(Inbound::Request { id, payload }) => {
                let Some(respond) = inner.upgrade().map(|inner| inner.respond(id, payload)) else {
                    return;
                };
                respond.await;
                continue;
            }
            None => return,
        };
        let (name, handlers) = match inner.upgrade() {
            Some(inner) => (
                inner.name.clone(),
                inner.notification_handlers.read().clone(),
            ),
            None => return,
        };
        if handlers.is_empty() {
            debug!(channel = %name, "notification with no handler, dropping");
            continue;
        }
        let results = join_all(handlers.iter().map(|h| h.handle(payload.clone()))).await;
        for err in results.into_iter().filter_map(Result::err) {
            warn!(channel = %name, error = %err, "notification handler failed");
        }
    }
}

async fn sweep_loop(inner: Weak<Inner>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(interval);
    // first tick fires immediately
    let _ = ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    return;
                };
                for id in inner.pending.sweep() {
                    warn!(channel = %inner.name, id, "request went stale, rejecting");
                }
            }
            () = cancel.cancelled() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{notification_fn, request_fn};
    use crate::transport::MemoryTransport;
    use assert_matches::assert_matches;
    use keynav_core::errors;
    use parking_lot::Mutex;
    use serde_json::json;

    fn config() -> ChannelConfig {
        ChannelConfig {
            sweep_interval: Duration::from_millis(100),
            ordered: false,
        }
    }

    fn pair() -> (Channel, Channel) {
        let (a, b) = MemoryTransport::pair();
        (
            Channel::open("a", a, config()),
            Channel::open("b", b, config()),
        )
    }

    #[tokio::test]
    async fn request_round_trip() {
        let (a, b) = pair();
        b.on_request(request_fn(|payload| async move {
            Ok(json!({"echo": payload}))
        }));
        let reply = a.request(json!("hi")).await.unwrap();
        assert_eq!(reply, json!({"echo": "hi"}));
        assert_eq!(a.pending_requests(), 0);
    }

    #[tokio::test]
    async fn no_handler_rejects() {
        let (a, _b) = pair();
        let err = a.request(json!(1)).await.unwrap_err();
        assert_eq!(err.remote_code(), Some(errors::NO_HANDLER));
    }

    #[tokio::test]
    async fn handler_error_is_remote_rejection() {
        let (a, b) = pair();
        b.on_request(request_fn(|_| async {
            Err(RemoteError::new(errors::NO_MATCH, "no hint matches"))
        }));
        let err = a.request(json!(null)).await.unwrap_err();
        assert_matches!(err, ChannelError::Rejected(e) if e.message == "no hint matches");
    }

    #[tokio::test]
    async fn panicking_handler_rejects() {
        let (a, b) = pair();
        b.on_request(request_fn(|_| async { panic!("boom") }));
        let err = a.request(json!(null)).await.unwrap_err();
        assert_eq!(err.remote_code(), Some(errors::HANDLER_PANICKED));
    }

    #[tokio::test]
    async fn concurrent_requests_are_multiplexed() {
        let (a, b) = pair();
        b.on_request(request_fn(|payload| async move {
            let n = payload.as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(30 - n * 10)).await;
            Ok(json!(n * 2))
        }));
        let (x, y, z) = tokio::join!(a.request(json!(0)), a.request(json!(1)), a.request(json!(2)));
        assert_eq!(x.unwrap(), json!(0));
        assert_eq!(y.unwrap(), json!(2));
        assert_eq!(z.unwrap(), json!(4));
    }

    #[tokio::test]
    async fn notifications_arrive_in_order() {
        let (a, b) = pair();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.on_notification(notification_fn(move |payload| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(payload);
                Ok(())
            }
        }));
        for i in 0..5 {
            a.notify(json!(i)).unwrap();
        }
        b.on_request(request_fn(|_| async { Ok(json!(null)) }));
        // a request sent after the notifications flushes the queue
        let _ = a.request(json!("sync")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock(), vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn failing_notification_handler_does_not_stop_others() {
        let (a, b) = pair();
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        b.on_notification(notification_fn(|_| async {
            Err(RemoteError::internal("always fails"))
        }));
        b.on_notification(notification_fn(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Ok(())
            }
        }));
        a.notify(json!(1)).unwrap();
        a.notify(json!(2)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*count.lock(), 2);
    }

    #[tokio::test]
    async fn notification_handler_can_request_back() {
        let (a, b) = pair();
        a.on_request(request_fn(|_| async { Ok(json!("from a")) }));
        let got = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&got);
        let b_clone = b.clone();
        b.on_notification(notification_fn(move |_| {
            let slot = Arc::clone(&slot);
            let b = b_clone.clone();
            async move {
                let reply = b.request(json!("ask")).await.map_err(RemoteError::from)?;
                *slot.lock() = Some(reply);
                Ok(())
            }
        }));
        a.notify(json!("go")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*got.lock(), Some(json!("from a")));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_goes_stale() {
        let (a, mut raw) = MemoryTransport::pair();
        let a = Channel::open("a", a, config());
        let start = time::Instant::now();
        let request = a.request(json!("anyone?"));
        let (result, received) = tokio::join!(request, raw.inbound.recv());
        assert!(received.is_some());
        assert_matches!(result, Err(ChannelError::Stale { id: 1 }));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100), "evicted after {waited:?}");
        assert!(waited <= Duration::from_millis(200), "evicted after {waited:?}");
    }

    #[tokio::test]
    async fn duplicate_response_is_dropped() {
        let (a, mut raw) = MemoryTransport::pair();
        let a = Channel::open("a", a, config());
        let transport = Arc::clone(&raw.transport);
        let responder = tokio::spawn(async move {
            let request: Envelope = serde_json::from_value(raw.inbound.recv().await.unwrap()).unwrap();
            let Envelope::Request { id, .. } = request else {
                panic!("expected a request");
            };
            let response = json!({"kind": "response", "id": id, "ok": true, "payload": "first"});
            transport.post(response.clone()).unwrap();
            transport.post(json!({"kind": "response", "id": id, "ok": true, "payload": "again"})).unwrap();
            raw
        });
        assert_eq!(a.request(json!(null)).await.unwrap(), json!("first"));
        let _raw = responder.await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(a.is_connected());
        assert_eq!(a.pending_requests(), 0);
    }

    #[tokio::test]
    async fn malformed_envelope_is_ignored() {
        let (a, raw) = MemoryTransport::pair();
        let a = Channel::open("a", a, config());
        raw.transport.post(json!({"what": "is this"})).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(a.is_connected());
    }

    #[tokio::test]
    async fn disconnect_fails_pending_and_closes_peer() {
        let (a, b) = pair();
        b.on_request(request_fn(|_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(json!(null))
        }));
        let waiter = {
            let a = a.clone();
            tokio::spawn(async move { a.request(json!(null)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(a.pending_requests(), 1);

        a.disconnect();
        assert_matches!(waiter.await.unwrap(), Err(ChannelError::Disconnected));
        a.closed().await;
        tokio::time::timeout(Duration::from_secs(1), b.closed())
            .await
            .expect("peer should observe the close");
        assert!(!b.is_connected());
    }

    #[tokio::test]
    async fn request_after_disconnect_fails_fast() {
        let (a, _b) = pair();
        a.disconnect();
        assert_matches!(a.request(json!(1)).await, Err(ChannelError::Disconnected));
        assert_matches!(a.notify(json!(1)), Err(ChannelError::Disconnected));
    }

    #[tokio::test]
    async fn dropping_last_handle_closes_peer() {
        let (a, b) = pair();
        drop(a);
        tokio::time::timeout(Duration::from_secs(1), b.closed())
            .await
            .expect("peer should observe the drop");
    }

    #[tokio::test]
    async fn ordered_channel_keeps_requests_behind_notifications() {
        let (a, b) = MemoryTransport::pair();
        let a = Channel::open("a", a, config());
        let b = Channel::open("b", b, config().ordered());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        b.on_notification(notification_fn(move |payload| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                sink.lock().push(payload);
                Ok(())
            }
        }));
        let sink = Arc::clone(&seen);
        b.on_request(request_fn(move |payload| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(payload);
                Ok(json!(null))
            }
        }));
        a.notify(json!("first")).unwrap();
        a.notify(json!("second")).unwrap();
        let _ = a.request(json!("third")).await.unwrap();
        assert_eq!(*seen.lock(), vec![json!("first"), json!("second"), json!("third")]);
    }

    #[tokio::test]
    async fn weak_handle_does_not_keep_channel_alive() {
        let (a, b) = pair();
        let weak = a.downgrade();
        assert_eq!(weak.upgrade().map(|c| c.name().to_string()), Some("a".to_string()));
        drop(a);
        assert!(weak.upgrade().is_none());
        tokio::time::timeout(Duration::from_secs(1), b.closed())
            .await
            .expect("peer should observe the drop");
    }

    #[tokio::test]
    async fn typed_helpers() {
        use keynav_core::messages::{CoordinatorToFrame, TargetIndexReply};

        let (a, b) = pair();
        b.on_request(request_fn(|payload| async move {
            let msg: CoordinatorToFrame = messages::decode(payload)?;
            assert_eq!(msg, CoordinatorToFrame::GetTargetIndex);
            Ok(json!({"localIndex": 3}))
        }));
        let reply: TargetIndexReply = a.request_as(&CoordinatorToFrame::GetTargetIndex).await.unwrap();
        assert_eq!(reply.local_index, Some(3));
    }
}
