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

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use vrpc_types::reserved::{
    self, is_lifecycle_method, parse_callback_tag, parse_promise_tag, promise_tag, METHOD_CALL_ALL,
    METHOD_CREATE, METHOD_CREATE_NAMED, METHOD_DELETE, METHOD_GET_NAMED, NOT_SERIALIZABLE,
};
use vrpc_types::{Envelope, Value};

use crate::callback::{CallbackHandle, CallbackSink};
use crate::descriptor::{Arg, ClassDescriptor, EventDisposer, MethodMeta, Outcome};

/// Side effect of a dispatched lifecycle method, reported back to whatever
/// owns client/instance tracking so it can update its maps without
/// re-parsing the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created { class: String, instance_id: String },
    CreatedNamed { class: String, instance_id: String, is_new: bool },
    GotNamed { class: String, instance_id: String },
    Deleted { class: String, instance_id: String, was_named: bool },
    CallAll,
    None,
}

struct InstanceRecord {
    class: String,
    object: crate::descriptor::BoxedInstance,
    named: bool,
    subscriptions: HashSet<(String, String, String)>,
    disposers: HashMap<(String, String, String), EventDisposer>,
}

/// Class registry and synchronous dispatch entry point.
pub struct Adapter {
    classes: Mutex<FxHashMap<String, Arc<ClassDescriptor>>>,
    instances: Mutex<FxHashMap<String, InstanceRecord>>,
    instance_order: Mutex<Vec<String>>,
    callback_sink: Mutex<Option<CallbackSink>>,
    next_anon_id: AtomicU64,
    uid: String,
}

impl Adapter {
    /// `uid` should be unique per agent process (e.g. derived from the
    /// broker client id) so anonymous instance ids never collide across
    /// restarts (Design Notes: "Instance identity").
    pub fn new(uid: impl Into<String>) -> Self {
        Adapter {
            classes: Mutex::new(FxHashMap::default()),
            instances: Mutex::new(FxHashMap::default()),
            instance_order: Mutex::new(Vec::new()),
            callback_sink: Mutex::new(None),
            next_anon_id: AtomicU64::new(1),
            uid: uid.into(),
        }
    }

    pub fn register(&self, descriptor: ClassDescriptor) {
        let name = descriptor.name().to_string();
        tracing::debug!(class = %name, "registering class");
        self.classes.lock().insert(name, Arc::new(descriptor));
    }

    pub fn on_callback(&self, sink: CallbackSink) {
        *self.callback_sink.lock() = Some(sink);
    }

    pub fn get_available_classes(&self) -> Vec<String> {
        self.classes.lock().keys().cloned().collect()
    }

    pub fn get_available_instances(&self, class: &str) -> Vec<String> {
        let order = self.instance_order.lock();
        let instances = self.instances.lock();
        order.iter().filter(|id| instances.get(*id).map(|r| r.class == class).unwrap_or(false)).cloned().collect()
    }

    pub fn get_available_member_functions(&self, class: &str) -> Option<Vec<(String, usize)>> {
        self.classes.lock().get(class).map(|c| c.member_functions())
    }

    pub fn get_available_static_functions(&self, class: &str) -> Option<Vec<(String, usize)>> {
        self.classes.lock().get(class).map(|c| c.static_functions())
    }

    pub fn get_available_meta_data(&self, class: &str) -> Option<FxHashMap<String, MethodMeta>> {
        self.classes.lock().get(class).map(|c| c.meta().clone())
    }

    /// Detaches every event subscription registered on behalf of `client_id`
    /// (`unregisterEventListeners`, invoked when a client goes offline).
    pub fn unregister_event_listeners(&self, client_id: &str) {
        let mut instances = self.instances.lock();
        for record in instances.values_mut() {
            let keys: Vec<_> =
                record.subscriptions.iter().filter(|(c, _, _)| c == client_id).cloned().collect();
            for key in keys {
                record.subscriptions.remove(&key);
                if let Some(dispose) = record.disposers.remove(&key) {
                    dispose();
                }
            }
        }
    }

    /// The synchronous dispatch entry point.
    /// Always mutates `envelope` so that exactly one of `data.r`/`data.e` is
    /// set; never panics on user-visible failures.
    pub fn call(&self, envelope: &mut Envelope) -> LifecycleEvent {
        let context = envelope.context.clone();
        let method = envelope.method.clone();

        let class_ctx = self.classes.lock().get(&context).cloned();
        let instance_class = {
            let instances = self.instances.lock();
            instances.get(&context).map(|r| r.class.clone())
        };

        if class_ctx.is_none() && instance_class.is_none() {
            envelope.set_error(format!("Could not find context: {context}"));
            return LifecycleEvent::None;
        }

        match method.as_str() {
            METHOD_CREATE if class_ctx.is_some() => self.dispatch_create(envelope, class_ctx.unwrap()),
            METHOD_CREATE_NAMED if class_ctx.is_some() => {
                self.dispatch_create_named(envelope, class_ctx.unwrap())
            }
            METHOD_GET_NAMED if class_ctx.is_some() => self.dispatch_get_named(envelope, class_ctx.unwrap()),
            METHOD_DELETE => self.dispatch_delete(envelope, class_ctx),
            METHOD_CALL_ALL if class_ctx.is_some() => self.dispatch_call_all(envelope, class_ctx.unwrap()),
            _ if is_lifecycle_method(&method) => {
                envelope.set_error(format!("Could not find context: {context}"));
                LifecycleEvent::None
            }
            _ => self.dispatch_regular(envelope, class_ctx, instance_class),
        }
    }

    fn next_instance_id(&self) -> String {
        let n = self.next_anon_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.uid, n)
    }

    fn dispatch_create(&self, envelope: &mut Envelope, class: Arc<ClassDescriptor>) -> LifecycleEvent {
        let args: Vec<Value> = envelope.args().into_iter().cloned().collect();
        match (class.constructor)(&args) {
            Ok(object) => {
                let id = self.next_instance_id();
                self.insert_instance(id.clone(), class.name().to_string(), object, false);
                set_return_checked(envelope, Value::String(id.clone()));
                LifecycleEvent::Created { class: class.name().to_string(), instance_id: id }
            }
            Err(e) => {
                envelope.set_error(e);
                LifecycleEvent::None
            }
        }
    }

    fn dispatch_create_named(&self, envelope: &mut Envelope, class: Arc<ClassDescriptor>) -> LifecycleEvent {
        let name = match envelope.arg(1).and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                envelope.set_error("__createNamed__ requires a name as its first argument".to_string());
                return LifecycleEvent::None;
            }
        };

        if self.instances.lock().contains_key(&name) {
            set_return_checked(envelope, Value::String(name.clone()));
            return LifecycleEvent::CreatedNamed { class: class.name().to_string(), instance_id: name, is_new: false };
        }

        let ctor_args: Vec<Value> = envelope.args().into_iter().skip(1).cloned().collect();
        match (class.constructor)(&ctor_args) {
            Ok(object) => {
                self.insert_instance(name.clone(), class.name().to_string(), object, true);
                set_return_checked(envelope, Value::String(name.clone()));
                LifecycleEvent::CreatedNamed { class: class.name().to_string(), instance_id: name, is_new: true }
            }
            Err(e) => {
                envelope.set_error(e);
                LifecycleEvent::None
            }
        }
    }

    fn dispatch_get_named(&self, envelope: &mut Envelope, class: Arc<ClassDescriptor>) -> LifecycleEvent {
        let name = match envelope.arg(1).and_then(Value::as_str) {
            Some(n) => n.to_string(),
            None => {
                envelope.set_error("__getNamed__ requires a name as its first argument".to_string());
                return LifecycleEvent::None;
            }
        };
        let exists = self.instances.lock().get(&name).map(|r| r.class == class.name()).unwrap_or(false);
        if exists {
            set_return_checked(envelope, Value::String(name.clone()));
            LifecycleEvent::GotNamed { class: class.name().to_string(), instance_id: name }
        } else {
            envelope.set_error(format!("Could not find named instance: {name}"));
            LifecycleEvent::None
        }
    }

    fn dispatch_delete(&self, envelope: &mut Envelope, class_ctx: Option<Arc<ClassDescriptor>>) -> LifecycleEvent {
        let target = if let (Some(class), Some(name)) = (&class_ctx, envelope.arg(1).and_then(Value::as_str)) {
            let name = name.to_string();
            let matches = self.instances.lock().get(&name).map(|r| r.class == class.name()).unwrap_or(false);
            if matches {
                Some(name)
            } else {
                None
            }
        } else if class_ctx.is_none() {
            Some(envelope.context.clone())
        } else {
            None
        };

        match target {
            Some(id) => {
                let removed = self.remove_instance(&id);
                match removed {
                    Some(record) => {
                        set_return_checked(envelope, Value::Bool(true));
                        LifecycleEvent::Deleted { class: record.class, instance_id: id, was_named: record.named }
                    }
                    None => {
                        set_return_checked(envelope, Value::Bool(false));
                        LifecycleEvent::None
                    }
                }
            }
            None => {
                set_return_checked(envelope, Value::Bool(false));
                LifecycleEvent::None
            }
        }
    }

    fn dispatch_call_all(&self, envelope: &mut Envelope, class: Arc<ClassDescriptor>) -> LifecycleEvent {
        let method = match envelope.arg(1).and_then(Value::as_str) {
            Some(m) => m.to_string(),
            None => {
                envelope.set_error("__callAll__ requires a method name as its first argument".to_string());
                return LifecycleEvent::None;
            }
        };
        let call_args: Vec<Value> = envelope.args().into_iter().skip(1).cloned().collect();

        let targets = self.get_available_instances(class.name());
        let mut results = Vec::with_capacity(targets.len());
        for id in targets {
            let object = {
                let instances = self.instances.lock();
                instances.get(&id).map(|r| r.object.clone())
            };
            let Some(object) = object else { continue };
            let mut record = BTreeMap::new();
            record.insert("id".to_string(), Value::String(id.clone()));
            match class.member(&method) {
                Some(f) => {
                    let resolved = self.resolve_args(&call_args, &envelope.sender);
                    match f(&object, &resolved) {
                        Ok(Outcome::Value(v)) => {
                            record.insert("r".to_string(), v);
                        }
                        Ok(Outcome::Deferred(_)) => {
                            record.insert("e".to_string(), Value::String(NOT_SERIALIZABLE.to_string()));
                        }
                        Err(e) => {
                            record.insert("e".to_string(), Value::String(e));
                        }
                    }
                }
                None => {
                    record.insert("e".to_string(), Value::String(format!("Could not find function: {method}")));
                }
            }
            results.push(Value::Object(record));
        }
        set_return_checked(envelope, Value::Array(results));
        LifecycleEvent::CallAll
    }

    fn dispatch_regular(
        &self,
        envelope: &mut Envelope,
        class_ctx: Option<Arc<ClassDescriptor>>,
        instance_class: Option<String>,
    ) -> LifecycleEvent {
        let method = envelope.method.clone();
        let args: Vec<Value> = envelope.args().into_iter().cloned().collect();
        let resolved = self.resolve_args(&args, &envelope.sender);

        if let Some(class) = class_ctx {
            match class.static_fn(&method) {
                Some(f) => {
                    self.invoke(envelope, f(&resolved));
                }
                None => envelope.set_error(format!("Could not find function: {method}")),
            }
            return LifecycleEvent::None;
        }

        let Some(class_name) = instance_class else {
            envelope.set_error(format!("Could not find context: {}", envelope.context));
            return LifecycleEvent::None;
        };
        let class = self.classes.lock().get(&class_name).cloned();
        let Some(class) = class else {
            envelope.set_error(format!("Could not find context: {}", envelope.context));
            return LifecycleEvent::None;
        };
        let object = {
            let instances = self.instances.lock();
            instances.get(&envelope.context).map(|r| r.object.clone())
        };
        let Some(object) = object else {
            envelope.set_error(format!("Could not find context: {}", envelope.context));
            return LifecycleEvent::None;
        };

        match class.member(&method) {
            Some(f) => {
                if class.is_event_source(&method) {
                    self.register_event_subscription(&envelope.context, &method, &resolved, &envelope.sender);
                }
                self.invoke(envelope, f(&object, &resolved));
            }
            None => envelope.set_error(format!("Could not find function: {method}")),
        }
        LifecycleEvent::None
    }

    fn register_event_subscription(&self, instance_id: &str, event: &str, args: &[Arg], sender: &str) {
        let Some(Arg::Callback(handle)) = args.first() else { return };
        let client_id = reserved::client_id_of_sender(sender);
        let key = (client_id, event.to_string(), handle.reply_id().to_string());
        let handle = handle.clone();
        let disposer: EventDisposer = Box::new(move || handle.disable());
        if let Some(record) = self.instances.lock().get_mut(instance_id) {
            record.subscriptions.insert(key.clone());
            record.disposers.insert(key, disposer);
        }
    }

    fn invoke(&self, envelope: &mut Envelope, outcome: Result<Outcome, String>) {
        match outcome {
            Ok(Outcome::Value(v)) => set_return_checked(envelope, v),
            Ok(Outcome::Deferred(fut)) => self.spawn_deferred(envelope, fut),
            Err(e) => envelope.set_error(e),
        }
    }

    fn spawn_deferred(
        &self,
        envelope: &mut Envelope,
        fut: futures_util::future::BoxFuture<'static, Result<Value, String>>,
    ) {
        let n = self.next_anon_id.fetch_add(1, Ordering::Relaxed);
        let tag = promise_tag(n);
        set_return_checked(envelope, Value::String(tag.clone()));

        let Some(sink) = self.callback_sink.lock().clone() else {
            tracing::warn!("deferred result produced with no callback sink installed; dropping");
            return;
        };
        let handle = CallbackHandle::new(sink, envelope.sender.clone(), tag);
        tokio::spawn(async move {
            match fut.await {
                Ok(v) => {
                    handle.resolve(v);
                }
                Err(e) => {
                    handle.reject(e);
                }
            }
        });
    }

    fn resolve_args(&self, args: &[Value], sender: &str) -> Vec<Arg> {
        let sink = self.callback_sink.lock().clone();
        args.iter()
            .map(|v| match v {
                Value::String(s) => {
                    if let Some(id) = parse_callback_tag(s).or_else(|| parse_promise_tag(s)) {
                        if let Some(sink) = &sink {
                            return Arg::Callback(CallbackHandle::new(
                                sink.clone(),
                                sender.to_string(),
                                id.to_string(),
                            ));
                        }
                    }
                    Arg::Value(v.clone())
                }
                other => Arg::Value(other.clone()),
            })
            .collect()
    }

    fn insert_instance(&self, id: String, class: String, object: crate::descriptor::BoxedInstance, named: bool) {
        self.instances.lock().insert(
            id.clone(),
            InstanceRecord { class, object, named, subscriptions: HashSet::new(), disposers: HashMap::new() },
        );
        self.instance_order.lock().push(id);
    }

    fn remove_instance(&self, id: &str) -> Option<RemovedInstance> {
        let record = self.instances.lock().remove(id)?;
        self.instance_order.lock().retain(|existing| existing != id);
        for (_, dispose) in record.disposers {
            dispose();
        }
        Some(RemovedInstance { class: record.class, named: record.named })
    }
}

struct RemovedInstance {
    class: String,
    named: bool,
}

fn set_return_checked(envelope: &mut Envelope, value: Value) {
    match serde_json::to_string(&value) {
        Ok(_) => envelope.set_return(value),
        Err(_) => envelope.set_return(Value::String(NOT_SERIALIZABLE.to_string())),
    }
}
