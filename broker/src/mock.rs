// Copyright 2019-2021 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures_channel::mpsc;
use parking_lot::Mutex;

use crate::client::{BrokerClient, BrokerEvent, PublishOptions, QoS};
use crate::error::BrokerError;

/// In-memory [`BrokerClient`] used by `vrpc-agent`'s test suite, standing in
/// for the real MQTT broker the same way `jsonrpsee-test-utils` stands in
/// for a real HTTP/WS peer.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

#[derive(Default)]
struct MockState {
    retained: HashMap<String, Vec<u8>>,
    subscriptions: HashSet<String>,
    published: Vec<PublishedMessage>,
    closed: bool,
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retained: bool,
}

impl MockBroker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (tx, rx) = mpsc::unbounded();
        (MockBroker { state: Arc::new(Mutex::new(MockState::default())), events: tx }, rx)
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    pub fn retained(&self, topic: &str) -> Option<Vec<u8>> {
        self.state.lock().retained.get(topic).cloned()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.state.lock().subscriptions.contains(topic)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscriptions.iter().cloned().collect()
    }

    /// Simulates an incoming publish from another client (e.g. a
    /// `__clientInfo__` offline notice).
    pub fn inject_message(&self, topic: impl Into<String>, payload: Vec<u8>, retained: bool) {
        let _ = self.events.unbounded_send(BrokerEvent::Message { topic: topic.into(), payload, retained });
    }

    pub fn inject_connect(&self, session_present: bool) {
        let _ = self.events.unbounded_send(BrokerEvent::Connect { session_present });
    }

    pub fn inject_reconnect(&self) {
        let _ = self.events.unbounded_send(BrokerEvent::Reconnect);
    }
}

#[async_trait]
impl BrokerClient for MockBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>, opts: PublishOptions) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        if opts.retain {
            if payload.is_empty() {
                state.retained.remove(topic);
            } else {
                state.retained.insert(topic.to_string(), payload.clone());
            }
        }
        state.published.push(PublishedMessage { topic: topic.to_string(), payload, retained: opts.retain });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), BrokerError> {
        self.state.lock().subscriptions.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.state.lock().subscriptions.remove(topic);
        Ok(())
    }

    async fn end(&self, _force: bool) -> Result<(), BrokerError> {
        self.state.lock().closed = true;
        let _ = self.events.unbounded_send(BrokerEvent::End);
        Ok(())
    }
}
