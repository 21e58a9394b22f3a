use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use beeper_types::NormalizedMessage;
use tokio::sync::broadcast;
use tracing::error;

pub type MessageCallback = Arc<dyn Fn(NormalizedMessage) + Send + Sync>;

/// Fans new messages out to subscribers.
///
/// Callbacks run synchronously on the poll task, in registration order, one
/// message at a time. A panicking callback is logged and skipped. Channel
/// subscribers get the same messages through a broadcast channel.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Lagging receivers lose the oldest messages, never block the poller
    broadcast_tx: broadcast::Sender<NormalizedMessage>,

    callbacks: RwLock<Vec<MessageCallback>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                callbacks: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a callback for every future message.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(NormalizedMessage) + Send + Sync + 'static,
    {
        self.inner
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(callback));
    }

    /// Subscribe through a broadcast receiver.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<NormalizedMessage> {
        self.inner.broadcast_tx.subscribe()
    }

    pub fn callback_count(&self) -> usize {
        self.inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one message to every subscriber. Each callback gets its own copy.
    pub fn dispatch(&self, message: NormalizedMessage) {
        // Snapshot so a callback may subscribe without deadlocking.
        let callbacks: Vec<MessageCallback> = self
            .inner
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, callback) in callbacks.iter().enumerate() {
            let copy = message.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| callback(copy))).is_err() {
                error!(
                    event_id = %message.event_id,
                    "Subscriber callback #{} panicked", index
                );
            }
        }

        // No receivers is fine.
        let _ = self.inner.broadcast_tx.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beeper_types::{MessageType, Network};
    use std::sync::Mutex;

    fn message(event_id: &str, timestamp: i64) -> NormalizedMessage {
        NormalizedMessage {
            room_id: "!r".into(),
            thread_id: "!r".into(),
            thread_name: "Chat (!r...)".into(),
            sender_id: "@bob".into(),
            sender_name: "@bob".into(),
            network: Network::Unknown,
            text: "hi".into(),
            timestamp,
            event_id: event_id.into(),
            message_type: MessageType::Text,
            is_sent_by_me: false,
            is_encrypted: false,
            is_reply: false,
            reply_to_id: None,
            human_time: String::new(),
            raw_message_data: serde_json::json!({}),
            raw_sender_data: serde_json::json!({}),
        }
    }

    #[test]
    fn callbacks_receive_in_order() {
        let dispatcher = Dispatcher::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = first.clone();
        dispatcher.subscribe(move |m| sink.lock().unwrap().push(m.event_id));
        let sink = second.clone();
        dispatcher.subscribe(move |m| sink.lock().unwrap().push(m.timestamp));
        assert_eq!(dispatcher.callback_count(), 2);

        dispatcher.dispatch(message("$1", 10));
        dispatcher.dispatch(message("$2", 20));

        assert_eq!(*first.lock().unwrap(), vec!["$1", "$2"]);
        assert_eq!(*second.lock().unwrap(), vec![10, 20]);
    }

    #[test]
    fn channel_subscribers_receive_copies() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe_channel();

        dispatcher.dispatch(message("$1", 10));
        assert_eq!(rx.try_recv().unwrap().event_id, "$1");
    }

    #[test]
    fn panicking_callback_does_not_starve_others() {
        let dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut rx = dispatcher.subscribe_channel();

        dispatcher.subscribe(|m| {
            if m.event_id == "$boom" {
                panic!("subscriber failure");
            }
        });
        let sink = seen.clone();
        dispatcher.subscribe(move |m| sink.lock().unwrap().push(m.event_id));

        dispatcher.dispatch(message("$boom", 10));
        dispatcher.dispatch(message("$2", 20));

        assert_eq!(*seen.lock().unwrap(), vec!["$boom", "$2"]);
        assert_eq!(rx.try_recv().unwrap().event_id, "$boom");
        assert_eq!(rx.try_recv().unwrap().event_id, "$2");
    }

    #[test]
    fn callback_may_subscribe_during_dispatch() {
        let dispatcher = Dispatcher::new();
        let inner = dispatcher.clone();
        dispatcher.subscribe(move |_| inner.subscribe(|_| {}));

        dispatcher.dispatch(message("$1", 10));
        assert_eq!(dispatcher.callback_count(), 2);
    }
}
