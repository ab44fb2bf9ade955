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

use std::sync::Arc;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot};
use vrpc_broker::{BrokerClient, BrokerEvent, ConnectOptions, LastWill, PublishOptions, QoS};
use vrpc_core::{Adapter, CallbackSink, ClassDescriptor, LifecycleEvent};
use vrpc_types::reserved::{self, METHOD_DELETE};
use vrpc_types::Envelope;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::ids::derive_client_id;
use crate::retained::{build_class_info, AgentInfo, AgentStatus};
use crate::state::{AgentEvent, AgentState};
use crate::topics::{self, parse_client_info_topic};
use crate::tracker::ClientTracker;

/// Opens a broker connection. Abstracted behind a trait so the session loop
/// can be driven by [`vrpc_broker::mock::MockBroker`] in tests the same way
/// `jsonrpsee`'s client transport is abstracted behind a trait shared by its
/// HTTP and WebSocket backends.
pub trait BrokerFactory: Send + Sync {
    fn connect(&self, opts: ConnectOptions) -> (Arc<dyn BrokerClient>, mpsc::UnboundedReceiver<BrokerEvent>);
}

/// Default factory, backed by a real MQTT connection via `rumqttc`.
pub struct RumqttcFactory;

impl BrokerFactory for RumqttcFactory {
    fn connect(&self, opts: ConnectOptions) -> (Arc<dyn BrokerClient>, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (broker, rx) = vrpc_broker::RumqttcBroker::connect(opts);
        (Arc::new(broker), bridge_events(rx))
    }
}

/// Every [`vrpc_broker::BrokerClient`] implementation yields a
/// `futures_channel` event receiver; the session loop is written against
/// `tokio::sync::mpsc` so it can share a `select!` arm with the command
/// channel. Factory implementors (including test fakes built on
/// [`vrpc_broker::mock::MockBroker`]) bridge through this helper.
pub fn bridge_events(mut rx: futures_channel::mpsc::UnboundedReceiver<BrokerEvent>) -> mpsc::UnboundedReceiver<BrokerEvent> {
    let (tx, rx2) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.next().await {
            if tx.send(event).is_err() {
                break;
            }
        }
    });
    rx2
}

enum Command {
    End { unregister: bool, done: oneshot::Sender<()> },
}

/// The Agent session: owns the broker connection lifecycle, the topic
/// scheme, and drives message dispatch through the [`Adapter`].
pub struct Agent {
    config: AgentConfig,
    adapter: Arc<Adapter>,
    factory: Arc<dyn BrokerFactory>,
    client_id: String,
    qos: QoS,
    state: Mutex<AgentState>,
    events_tx: broadcast::Sender<AgentEvent>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        Self::with_factory(config, Arc::new(RumqttcFactory))
    }

    pub fn with_factory(config: AgentConfig, factory: Arc<dyn BrokerFactory>) -> Result<Self, AgentError> {
        config.validate()?;
        let client_id = derive_client_id(&config.domain, &config.agent);
        let qos = QoS::from_best_effort(config.best_effort);
        let adapter = Arc::new(Adapter::new(client_id.clone()));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Ok(Agent {
            config,
            adapter,
            factory,
            client_id,
            qos,
            state: Mutex::new(AgentState::Init),
            events_tx: broadcast::channel(64).0,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
        })
    }

    pub fn register(&self, descriptor: ClassDescriptor) {
        self.adapter.register(descriptor);
    }

    pub fn adapter(&self) -> &Arc<Adapter> {
        &self.adapter
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AgentEvent> {
        self.events_tx.subscribe()
    }

    /// Requests shutdown. Resolves once the session loop
    /// has published the offline notice and closed the connection.
    pub async fn end(&self, unregister: bool) -> Result<(), AgentError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.commands_tx
            .send(Command::End { unregister, done: done_tx })
            .map_err(|_| AgentError::NotConnected)?;
        done_rx.await.map_err(|_| AgentError::NotConnected)
    }

    fn transition(&self, next: AgentState) {
        let mut state = self.state.lock();
        if state.can_transition_to(next) {
            tracing::debug!(from = ?*state, to = ?next, "agent state transition");
            *state = next;
        } else {
            tracing::warn!(from = ?*state, to = ?next, "ignored illegal agent state transition");
        }
    }

    fn emit(&self, event: AgentEvent) {
        let _ = self.events_tx.send(event);
    }

    fn connect_options(&self, clean_session: bool) -> ConnectOptions {
        let last_will = LastWill {
            topic: topics::agent_info_topic(&self.config.domain, &self.config.agent),
            payload: AgentInfo::new(AgentStatus::Offline, self.config.version.clone()).to_payload(),
            qos: self.qos,
            retain: true,
        };
        ConnectOptions {
            client_id: self.client_id.clone(),
            broker_url: self.config.broker.clone(),
            credentials: self.config.credentials.clone(),
            clean_session,
            last_will: Some(last_will),
            insecure_tls: false,
        }
    }

    /// Runs the agent session to completion: two-phase connect, then the
    /// message loop, until `end()` is called or the broker connection ends.
    pub async fn serve(&self) -> Result<(), AgentError> {
        let mut commands_rx =
            self.commands_rx.lock().take().expect("serve() must only be called once per Agent");

        self.run_cleanup_phase().await?;
        let (broker, mut broker_rx) = self.run_operational_connect().await?;

        let (callback_sink, callback_rx) = CallbackSink::channel();
        self.adapter.on_callback(callback_sink);
        tokio::spawn(forward_callbacks(Arc::clone(&broker), self.qos, callback_rx));

        let mut tracker = ClientTracker::new();

        loop {
            tokio::select! {
                event = broker_rx.recv() => {
                    match event {
                        Some(event) => {
                            if self.handle_broker_event(&broker, &mut tracker, event).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                command = commands_rx.recv() => {
                    match command {
                        Some(Command::End { unregister, done }) => {
                            self.run_shutdown(&broker, unregister).await;
                            let _ = done.send(());
                            break;
                        }
                        None => {}
                    }
                }
            }
        }

        self.transition(AgentState::Ended);
        self.emit(AgentEvent::End);
        Ok(())
    }

    async fn run_cleanup_phase(&self) -> Result<(), AgentError> {
        self.transition(AgentState::Cleaning);
        let (broker, mut rx) = self.factory.connect(self.connect_options(true));
        match rx.recv().await {
            Some(BrokerEvent::Connect { .. }) => {}
            _ => return Err(AgentError::NotConnected),
        }
        broker.end(false).await?;
        Ok(())
    }

    async fn run_operational_connect(&self) -> Result<(Arc<dyn BrokerClient>, mpsc::UnboundedReceiver<BrokerEvent>), AgentError> {
        self.transition(AgentState::Connecting);
        let (broker, mut rx) = self.factory.connect(self.connect_options(false));
        let session_present = match rx.recv().await {
            Some(BrokerEvent::Connect { session_present }) => session_present,
            _ => return Err(AgentError::NotConnected),
        };
        self.transition(AgentState::Connected);
        self.emit(AgentEvent::Connect);

        if !session_present {
            for class in self.adapter.get_available_classes() {
                let topic = topics::static_wildcard(&self.config.domain, &self.config.agent, &class);
                broker.subscribe(&topic, self.qos).await?;
                self.publish_class_info(&broker, &class).await;
            }
        }
        self.publish_agent_info(&broker, AgentStatus::Online).await;

        Ok((broker, rx))
    }

    /// Returns `true` if the session loop should stop.
    async fn handle_broker_event(
        &self,
        broker: &Arc<dyn BrokerClient>,
        tracker: &mut ClientTracker,
        event: BrokerEvent,
    ) -> bool {
        match event {
            BrokerEvent::Connect { .. } => {
                self.transition(AgentState::Connected);
                self.emit(AgentEvent::Reconnect);
                self.publish_agent_info(broker, AgentStatus::Online).await;
                false
            }
            BrokerEvent::Reconnect => {
                self.transition(AgentState::Reconnecting);
                self.emit(AgentEvent::Reconnect);
                false
            }
            BrokerEvent::Message { topic, payload, .. } => {
                self.route_message(broker, tracker, &topic, &payload).await;
                false
            }
            BrokerEvent::Offline => {
                self.emit(AgentEvent::Offline);
                false
            }
            BrokerEvent::Error(message) => {
                self.emit(AgentEvent::Error(message));
                false
            }
            BrokerEvent::Close => {
                self.emit(AgentEvent::Close);
                true
            }
            BrokerEvent::End => true,
        }
    }

    async fn route_message(&self, broker: &Arc<dyn BrokerClient>, tracker: &mut ClientTracker, topic: &str, payload: &[u8]) {
        if let Some(client_id) = parse_client_info_topic(topic) {
            if is_offline_notice(payload) {
                self.handle_client_offline(broker, tracker, client_id).await;
            }
            return;
        }

        let text = match std::str::from_utf8(payload) {
            Ok(t) => t,
            Err(_) => {
                tracing::warn!(%topic, "dropped message with non-UTF-8 payload");
                return;
            }
        };
        let mut envelope = match Envelope::from_json(text) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(%topic, error = %e, "dropped malformed envelope");
                return;
            }
        };
        self.handle_rpc_message(broker, tracker, &mut envelope).await;
    }

    async fn handle_rpc_message(&self, broker: &Arc<dyn BrokerClient>, tracker: &mut ClientTracker, envelope: &mut Envelope) {
        let event = self.adapter.call(envelope);
        let client_id = reserved::client_id_of_sender(&envelope.sender);

        match event {
            LifecycleEvent::Created { class, instance_id } => {
                self.publish_reply(broker, envelope).await;
                self.subscribe_instance(broker, &class, &instance_id).await;
                let outcome = tracker.track_anonymous(&client_id, &instance_id);
                if outcome.client_is_new {
                    self.subscribe_client_info(broker, &client_id).await;
                }
            }
            LifecycleEvent::CreatedNamed { class, instance_id, is_new } => {
                self.publish_reply(broker, envelope).await;
                if is_new {
                    self.subscribe_instance(broker, &class, &instance_id).await;
                }
                let outcome = tracker.track_named(&client_id, &instance_id);
                if outcome.client_is_new {
                    self.subscribe_client_info(broker, &client_id).await;
                }
                if is_new {
                    self.publish_class_info(broker, &class).await;
                }
            }
            LifecycleEvent::GotNamed { instance_id, .. } => {
                self.publish_reply(broker, envelope).await;
                let outcome = tracker.track_named(&client_id, &instance_id);
                if outcome.client_is_new {
                    self.subscribe_client_info(broker, &client_id).await;
                }
            }
            LifecycleEvent::Deleted { class, instance_id, was_named } => {
                self.unsubscribe_instance(broker, &class, &instance_id).await;
                let untrack = tracker.untrack_instance(&instance_id);
                for empty_client in &untrack.clients_now_empty {
                    self.unsubscribe_client_info(broker, empty_client).await;
                }
                if was_named {
                    self.publish_class_info(broker, &class).await;
                }
                self.publish_reply(broker, envelope).await;
            }
            LifecycleEvent::CallAll | LifecycleEvent::None => {
                self.publish_reply(broker, envelope).await;
            }
        }
    }

    async fn handle_client_offline(&self, broker: &Arc<dyn BrokerClient>, tracker: &mut ClientTracker, client_id: &str) {
        for instance_id in tracker.anonymous_instances_of(client_id) {
            let mut envelope = Envelope::new(instance_id.clone(), METHOD_DELETE, format!("{client_id}/__vrpc-gc__"));
            match self.adapter.call(&mut envelope) {
                LifecycleEvent::Deleted { class, instance_id, was_named } => {
                    self.unsubscribe_instance(broker, &class, &instance_id).await;
                    let untrack = tracker.untrack_instance(&instance_id);
                    for empty_client in &untrack.clients_now_empty {
                        self.unsubscribe_client_info(broker, empty_client).await;
                    }
                    if was_named {
                        self.publish_class_info(broker, &class).await;
                    }
                }
                _ => {
                    tracing::warn!(
                        instance_id = %instance_id,
                        error = ?envelope.error(),
                        "failed to garbage-collect anonymous instance for offline client"
                    );
                }
            }
        }
        self.adapter.unregister_event_listeners(client_id);
        self.unsubscribe_client_info(broker, client_id).await;
    }

    async fn run_shutdown(&self, broker: &Arc<dyn BrokerClient>, unregister: bool) {
        self.transition(AgentState::Ending);
        self.publish_agent_info(broker, AgentStatus::Offline).await;

        if unregister {
            let agent_info_topic = topics::agent_info_topic(&self.config.domain, &self.config.agent);
            let _ = broker.publish(&agent_info_topic, Vec::new(), PublishOptions::retained(self.qos)).await;
            for class in self.adapter.get_available_classes() {
                let topic = topics::class_info_topic(&self.config.domain, &self.config.agent, &class);
                let _ = broker.publish(&topic, Vec::new(), PublishOptions::retained(self.qos)).await;
            }
        }

        let _ = broker.end(false).await;

        // Discard server-side durable session state left by this run.
        let (final_broker, mut rx) = self.factory.connect(self.connect_options(true));
        if matches!(rx.recv().await, Some(BrokerEvent::Connect { .. })) {
            let _ = final_broker.end(false).await;
        }
    }

    async fn publish_reply(&self, broker: &Arc<dyn BrokerClient>, envelope: &Envelope) {
        let sender = envelope.sender.clone();
        match envelope.to_json() {
            Ok(json) => {
                if let Err(e) = broker.publish(&sender, json.into_bytes(), PublishOptions::plain(self.qos)).await {
                    tracing::warn!(sender = %sender, error = %e, "failed to publish reply");
                }
            }
            Err(e) => tracing::error!(sender = %sender, error = %e, "failed to encode reply envelope"),
        }
    }

    async fn publish_agent_info(&self, broker: &Arc<dyn BrokerClient>, status: AgentStatus) {
        let topic = topics::agent_info_topic(&self.config.domain, &self.config.agent);
        let payload = AgentInfo::new(status, self.config.version.clone()).to_payload();
        if let Err(e) = broker.publish(&topic, payload, PublishOptions::retained(self.qos)).await {
            tracing::warn!(%topic, error = %e, "failed to publish agent info");
        }
    }

    async fn publish_class_info(&self, broker: &Arc<dyn BrokerClient>, class: &str) {
        let Some(info) = build_class_info(&self.adapter, class) else { return };
        let topic = topics::class_info_topic(&self.config.domain, &self.config.agent, class);
        if let Err(e) = broker.publish(&topic, info.to_payload(), PublishOptions::retained(self.qos)).await {
            tracing::warn!(%topic, error = %e, "failed to publish class info");
        }
    }

    async fn subscribe_instance(&self, broker: &Arc<dyn BrokerClient>, class: &str, instance: &str) {
        let topic = topics::instance_wildcard(&self.config.domain, &self.config.agent, class, instance);
        if let Err(e) = broker.subscribe(&topic, self.qos).await {
            tracing::warn!(%topic, error = %e, "failed to subscribe to instance topic");
        }
    }

    async fn unsubscribe_instance(&self, broker: &Arc<dyn BrokerClient>, class: &str, instance: &str) {
        let topic = topics::instance_wildcard(&self.config.domain, &self.config.agent, class, instance);
        if let Err(e) = broker.unsubscribe(&topic).await {
            tracing::warn!(%topic, error = %e, "failed to unsubscribe from instance topic");
        }
    }

    async fn subscribe_client_info(&self, broker: &Arc<dyn BrokerClient>, client_id: &str) {
        let topic = topics::client_info_topic(client_id);
        if let Err(e) = broker.subscribe(&topic, self.qos).await {
            tracing::warn!(%topic, error = %e, "failed to subscribe to client info topic");
        }
    }

    async fn unsubscribe_client_info(&self, broker: &Arc<dyn BrokerClient>, client_id: &str) {
        let topic = topics::client_info_topic(client_id);
        if let Err(e) = broker.unsubscribe(&topic).await {
            tracing::warn!(%topic, error = %e, "failed to unsubscribe from client info topic");
        }
    }
}

async fn forward_callbacks(broker: Arc<dyn BrokerClient>, qos: QoS, mut callback_rx: futures_channel::mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = callback_rx.next().await {
        let sender = envelope.sender.clone();
        match envelope.to_json() {
            Ok(json) => {
                if let Err(e) = broker.publish(&sender, json.into_bytes(), PublishOptions::plain(qos)).await {
                    tracing::warn!(sender = %sender, error = %e, "failed to publish callback invocation");
                }
            }
            Err(e) => tracing::error!(sender = %sender, error = %e, "failed to encode callback envelope"),
        }
    }
}

fn is_offline_notice(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(text).ok())
        .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(|s| s == "offline"))
        .unwrap_or(false)
}
