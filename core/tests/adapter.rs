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

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vrpc_core::{Adapter, Arg, ClassDescriptor, MemberFn, Outcome};
use vrpc_types::reserved::{METHOD_CREATE, METHOD_CREATE_NAMED, METHOD_DELETE, METHOD_GET_NAMED};
use vrpc_types::{Envelope, Value};

struct TestClass {
    entries: Mutex<HashMap<String, Value>>,
}

fn register_test_class(adapter: &Adapter) {
    let constructor = Arc::new(|_args: &[Value]| {
        Ok(Arc::new(TestClass { entries: Mutex::new(HashMap::new()) }) as Arc<dyn std::any::Any + Send + Sync>)
    });

    let has_entry: MemberFn = Arc::new(|object, args| {
        let this = object.downcast_ref::<TestClass>().unwrap();
        let key = args.first().and_then(Arg::as_value).and_then(Value::as_str).unwrap_or_default();
        Ok(Outcome::Value(Value::Bool(this.entries.lock().contains_key(key))))
    });

    let set_entry: MemberFn = Arc::new(|object, args| {
        let this = object.downcast_ref::<TestClass>().unwrap();
        let key = args.first().and_then(Arg::as_value).and_then(Value::as_str).unwrap_or_default().to_string();
        let value = args.get(1).and_then(Arg::as_value).cloned().unwrap_or(Value::Null);
        this.entries.lock().insert(key, value);
        Ok(Outcome::Value(Value::Bool(true)))
    });

    let call_me_back_later: MemberFn = Arc::new(|_object, args| {
        let cb = args.first().and_then(Arg::as_callback).cloned();
        Ok(Outcome::Deferred(Box::pin(async move {
            if let Some(cb) = cb {
                cb.emit(vec![Value::String("later".into())]);
            }
            Ok(Value::Bool(true))
        })))
    });

    let descriptor = ClassDescriptor::builder("TestClass", constructor)
        .member("hasEntry", 1, has_entry)
        .member("setEntry", 2, set_entry)
        .member("callMeBackLater", 1, call_me_back_later)
        .build();

    adapter.register(descriptor);
}

#[test]
fn register_then_list_classes() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);
    assert_eq!(adapter.get_available_classes(), vec!["TestClass".to_string()]);
}

#[test]
fn create_then_call_member() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);

    let mut create = Envelope::new("TestClass", METHOD_CREATE, "s1").with_id("1");
    adapter.call(&mut create);
    let id = create.return_value().and_then(Value::as_str).unwrap().to_string();
    assert!(!id.is_empty());
    assert!(adapter.get_available_instances("TestClass").contains(&id));

    let mut has_entry = Envelope::new(id.clone(), "hasEntry", "s1").with_id("2").with_arg(1, "test");
    adapter.call(&mut has_entry);
    assert_eq!(has_entry.return_value(), Some(&Value::Bool(false)));
}

#[test]
fn deleted_instance_context_is_unreachable() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);

    let mut create = Envelope::new("TestClass", METHOD_CREATE, "s1");
    adapter.call(&mut create);
    let id = create.return_value().and_then(Value::as_str).unwrap().to_string();

    let mut delete = Envelope::new(id.clone(), METHOD_DELETE, "s1");
    adapter.call(&mut delete);
    assert_eq!(delete.return_value(), Some(&Value::Bool(true)));

    let mut call_again = Envelope::new(id.clone(), "hasEntry", "s1").with_arg(1, "x");
    adapter.call(&mut call_again);
    assert_eq!(call_again.error(), Some(format!("Could not find context: {id}").as_str()));
}

#[test]
fn named_create_is_idempotent_and_deletable() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);

    let mut create_named = Envelope::new("TestClass", METHOD_CREATE_NAMED, "s2")
        .with_arg(1, "alice")
        .with_arg(2, "nice")
        .with_arg(3, 1i64);
    adapter.call(&mut create_named);
    assert_eq!(create_named.return_value(), Some(&Value::String("alice".into())));
    assert!(adapter.get_available_instances("TestClass").contains(&"alice".to_string()));

    let mut get_named = Envelope::new("TestClass", METHOD_GET_NAMED, "s2").with_arg(1, "alice");
    adapter.call(&mut get_named);
    assert_eq!(get_named.return_value(), Some(&Value::String("alice".into())));

    let mut delete = Envelope::new("TestClass", METHOD_DELETE, "s2").with_arg(1, "alice");
    adapter.call(&mut delete);
    assert_eq!(delete.return_value(), Some(&Value::Bool(true)));
    assert!(!adapter.get_available_instances("TestClass").contains(&"alice".to_string()));
}

#[test]
fn unknown_method_reports_function_not_found() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);

    let mut create = Envelope::new("TestClass", METHOD_CREATE, "s3");
    adapter.call(&mut create);
    let id = create.return_value().and_then(Value::as_str).unwrap().to_string();

    let mut call = Envelope::new(id, "not_there", "s3");
    adapter.call(&mut call);
    assert_eq!(call.error(), Some("Could not find function: not_there"));
}

#[tokio::test]
async fn deferred_result_and_callback_both_fire() {
    let adapter = Adapter::new("agent1");
    register_test_class(&adapter);
    let (sink, mut rx) = vrpc_core::CallbackSink::channel();
    adapter.on_callback(sink);

    let mut create = Envelope::new("TestClass", METHOD_CREATE, "s4");
    adapter.call(&mut create);
    let id = create.return_value().and_then(Value::as_str).unwrap().to_string();

    let mut call = Envelope::new(id, "callMeBackLater", "s4").with_id("4").with_arg(1, "__f__cb-1");
    adapter.call(&mut call);
    let tag = call.return_value().and_then(Value::as_str).unwrap().to_string();
    assert!(tag.starts_with("__p__"));

    let first = rx.next_envelope().await.unwrap();
    let second = rx.next_envelope().await.unwrap();
    let ids: Vec<String> = [first, second]
        .iter()
        .map(|e| e.id.as_ref().and_then(Value::as_str).unwrap().to_string())
        .collect();
    assert!(ids.contains(&"cb-1".to_string()));
    assert!(ids.contains(&tag));
}

trait NextEnvelope {
    fn next_envelope(&mut self) -> futures_util::future::BoxFuture<'_, Option<vrpc_types::Envelope>>;
}

impl NextEnvelope for futures_channel::mpsc::UnboundedReceiver<vrpc_types::Envelope> {
    fn next_envelope(&mut self) -> futures_util::future::BoxFuture<'_, Option<vrpc_types::Envelope>> {
        use futures_util::StreamExt;
        Box::pin(self.next())
    }
}
