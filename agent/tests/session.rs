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

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use vrpc_agent::{Agent, AgentConfig, BrokerFactory};
use vrpc_broker::mock::MockBroker;
use vrpc_broker::{BrokerClient, BrokerEvent, ConnectOptions};
use vrpc_core::{Arg, ClassDescriptor, ConstructorFn, MemberFn, Outcome};
use vrpc_types::{Envelope, Value};

/// Hands out pre-built [`MockBroker`] connections in order: one per
/// `connect()` call, mirroring the agent's two-phase connect.
struct QueueFactory {
    queue: Mutex<VecDeque<(MockBroker, futures_channel::mpsc::UnboundedReceiver<BrokerEvent>)>>,
}

impl QueueFactory {
    fn new(queue: VecDeque<(MockBroker, futures_channel::mpsc::UnboundedReceiver<BrokerEvent>)>) -> Self {
        QueueFactory { queue: Mutex::new(queue) }
    }
}

impl BrokerFactory for QueueFactory {
    fn connect(
        &self,
        _opts: ConnectOptions,
    ) -> (Arc<dyn BrokerClient>, tokio::sync::mpsc::UnboundedReceiver<BrokerEvent>) {
        let (broker, rx) = self.queue.lock().pop_front().expect("test factory exhausted");
        (Arc::new(broker), vrpc_agent::bridge_events(rx))
    }
}

struct Counter {
    entries: Mutex<std::collections::HashMap<String, Value>>,
}

fn counter_descriptor() -> ClassDescriptor {
    let constructor: ConstructorFn =
        Arc::new(|_args| Ok(Arc::new(Counter { entries: Mutex::new(Default::default()) }) as Arc<dyn std::any::Any + Send + Sync>));

    let has_entry: MemberFn = Arc::new(|object, args| {
        let this = object.downcast_ref::<Counter>().unwrap();
        let key = args.first().and_then(Arg::as_value).and_then(Value::as_str).unwrap_or_default();
        Ok(Outcome::Value(Value::Bool(this.entries.lock().contains_key(key))))
    });

    ClassDescriptor::builder("Counter", constructor).member("hasEntry", 1, has_entry).build()
}

fn test_config() -> AgentConfig {
    AgentConfig::new("testdomain", "testagent").with_broker("mqtt://localhost:1883")
}

/// Builds a queued factory with `phases` mock broker connections, returning
/// the factory plus a clone of each broker so the test can inject events and
/// inspect publications after `serve()` has taken ownership of the factory.
fn queued_brokers(phases: usize) -> (QueueFactory, Vec<MockBroker>) {
    let mut queue = VecDeque::new();
    let mut handles = Vec::new();
    for _ in 0..phases {
        let (broker, rx) = MockBroker::new();
        handles.push(broker.clone());
        queue.push_back((broker, rx));
    }
    (QueueFactory::new(queue), handles)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn create_and_call_round_trip() {
    let (factory, brokers) = queued_brokers(2);
    let cleaning = brokers[0].clone();
    let operational = brokers[1].clone();
    cleaning.inject_connect(false);
    operational.inject_connect(false);

    let agent = Arc::new(Agent::with_factory(test_config(), Arc::new(factory)).unwrap());
    agent.register(counter_descriptor());
    let serve_handle = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move { agent.serve().await }
    });
    settle().await;

    let create = Envelope::new("Counter", "__create__", "s1").with_id("1");
    operational.inject_message("irrelevant-topic", create.to_json().unwrap().into_bytes(), false);
    settle().await;

    let reply = operational.published().last().cloned().expect("expected a reply");
    let envelope: Envelope = Envelope::from_json(&String::from_utf8(reply.payload).unwrap()).unwrap();
    let instance_id = envelope.return_value().and_then(Value::as_str).expect("create returns an id").to_string();
    assert!(!instance_id.is_empty());
    assert!(operational.is_subscribed(&format!("testdomain/testagent/Counter/{instance_id}/+")));

    let call = Envelope::new(instance_id, "hasEntry", "s1").with_id("2").with_arg(1, "missing");
    operational.inject_message("irrelevant-topic", call.to_json().unwrap().into_bytes(), false);
    settle().await;

    let reply2 = operational.published().last().cloned().unwrap();
    let envelope2: Envelope = Envelope::from_json(&String::from_utf8(reply2.payload).unwrap()).unwrap();
    assert_eq!(envelope2.return_value(), Some(&Value::Bool(false)));

    serve_handle.abort();
}

#[tokio::test]
async fn named_create_publishes_class_info_then_delete_republishes() {
    let (factory, brokers) = queued_brokers(2);
    brokers[0].inject_connect(false);
    brokers[1].inject_connect(false);
    let operational = brokers[1].clone();

    let agent = Arc::new(Agent::with_factory(test_config(), Arc::new(factory)).unwrap());
    agent.register(counter_descriptor());
    let serve_handle = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move { agent.serve().await }
    });
    settle().await;

    let create_named = Envelope::new("Counter", "__createNamed__", "s2").with_arg(1, "alice");
    operational.inject_message("t", create_named.to_json().unwrap().into_bytes(), false);
    settle().await;

    let class_info_topic = "testdomain/testagent/Counter/__classInfo__";
    let retained = operational.retained(class_info_topic).expect("class info was published");
    let doc: serde_json::Value = serde_json::from_slice(&retained).unwrap();
    assert_eq!(doc["instances"], serde_json::json!(["alice"]));

    let delete = Envelope::new("Counter", "__delete__", "s2").with_arg(1, "alice");
    operational.inject_message("t", delete.to_json().unwrap().into_bytes(), false);
    settle().await;

    let retained_after = operational.retained(class_info_topic).expect("class info still present");
    let doc_after: serde_json::Value = serde_json::from_slice(&retained_after).unwrap();
    assert_eq!(doc_after["instances"], serde_json::json!([]));

    serve_handle.abort();
}

#[tokio::test]
async fn unknown_method_reports_error() {
    let (factory, brokers) = queued_brokers(2);
    brokers[0].inject_connect(false);
    brokers[1].inject_connect(false);
    let operational = brokers[1].clone();

    let agent = Arc::new(Agent::with_factory(test_config(), Arc::new(factory)).unwrap());
    agent.register(counter_descriptor());
    let serve_handle = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move { agent.serve().await }
    });
    settle().await;

    let create = Envelope::new("Counter", "__create__", "s3");
    operational.inject_message("t", create.to_json().unwrap().into_bytes(), false);
    settle().await;
    let reply = operational.published().last().cloned().unwrap();
    let envelope: Envelope = Envelope::from_json(&String::from_utf8(reply.payload).unwrap()).unwrap();
    let instance_id = envelope.return_value().and_then(Value::as_str).unwrap().to_string();

    let bogus = Envelope::new(instance_id, "not_there", "s3");
    operational.inject_message("t", bogus.to_json().unwrap().into_bytes(), false);
    settle().await;
    let reply2 = operational.published().last().cloned().unwrap();
    let envelope2: Envelope = Envelope::from_json(&String::from_utf8(reply2.payload).unwrap()).unwrap();
    assert_eq!(envelope2.error(), Some("Could not find function: not_there"));

    serve_handle.abort();
}

#[tokio::test]
async fn offline_client_info_garbage_collects_anonymous_instance() {
    let (factory, brokers) = queued_brokers(2);
    brokers[0].inject_connect(false);
    brokers[1].inject_connect(false);
    let operational = brokers[1].clone();

    let agent = Arc::new(Agent::with_factory(test_config(), Arc::new(factory)).unwrap());
    agent.register(counter_descriptor());
    let serve_handle = tokio::spawn({
        let agent = Arc::clone(&agent);
        async move { agent.serve().await }
    });
    settle().await;

    let create = Envelope::new("Counter", "__create__", "client-a/replies").with_id("1");
    operational.inject_message("t", create.to_json().unwrap().into_bytes(), false);
    settle().await;
    let reply = operational.published().last().cloned().unwrap();
    let envelope: Envelope = Envelope::from_json(&String::from_utf8(reply.payload).unwrap()).unwrap();
    let instance_id = envelope.return_value().and_then(Value::as_str).unwrap().to_string();

    assert!(operational.is_subscribed("client-a/__clientInfo__"));
    assert!(operational.is_subscribed(&format!("testdomain/testagent/Counter/{instance_id}/+")));

    operational.inject_message("client-a/__clientInfo__", br#"{"status":"offline"}"#.to_vec(), true);
    settle().await;

    assert!(!operational.is_subscribed(&format!("testdomain/testagent/Counter/{instance_id}/+")));
    assert!(!operational.is_subscribed("client-a/__clientInfo__"));

    serve_handle.abort();
}
