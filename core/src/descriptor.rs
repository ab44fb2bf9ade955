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

use std::any::Any;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use rustc_hash::FxHashMap;
use vrpc_types::Value;

use crate::callback::CallbackHandle;

/// A live, registered instance. Host classes are type-erased behind `Any`;
/// the trampolines a class registers are the only code that downcasts it.
pub type BoxedInstance = Arc<dyn Any + Send + Sync>;

/// An argument already resolved from the wire: either a plain value, or a
/// `__f__`/`__p__` placeholder turned into a callable handle.
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Callback(CallbackHandle),
}

impl Arg {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(v) => Some(v),
            Arg::Callback(_) => None,
        }
    }

    pub fn as_callback(&self) -> Option<&CallbackHandle> {
        match self {
            Arg::Callback(c) => Some(c),
            Arg::Value(_) => None,
        }
    }
}

/// Result of invoking a method trampoline: either an immediate value or a
/// pending computation whose resolution arrives later via the callback sink
/// under a fresh promise tag.
pub enum Outcome {
    Value(Value),
    Deferred(BoxFuture<'static, Result<Value, String>>),
}

impl From<Value> for Outcome {
    fn from(v: Value) -> Self {
        Outcome::Value(v)
    }
}

pub type ConstructorFn = Arc<dyn Fn(&[Value]) -> Result<BoxedInstance, String> + Send + Sync>;
pub type StaticFn = Arc<dyn Fn(&[Arg]) -> Result<Outcome, String> + Send + Sync>;
pub type MemberFn = Arc<dyn Fn(&BoxedInstance, &[Arg]) -> Result<Outcome, String> + Send + Sync>;

/// Disposer returned by registering an event-source subscription, invoked
/// when the owning client goes offline or calls `unregisterEventListeners`.
pub type EventDisposer = Box<dyn FnOnce() + Send>;

/// Per-method introspection metadata, published only in retained
/// `__classInfo__.meta` documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MethodMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParamMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A registered class: constructors, member/static method tables, event
/// source markers and introspection metadata.
pub struct ClassDescriptor {
    pub(crate) name: String,
    pub(crate) constructor: ConstructorFn,
    pub(crate) members: FxHashMap<String, MemberFn>,
    pub(crate) member_arity: FxHashMap<String, usize>,
    pub(crate) statics: FxHashMap<String, StaticFn>,
    pub(crate) static_arity: FxHashMap<String, usize>,
    pub(crate) events: std::collections::HashSet<String>,
    pub(crate) meta: FxHashMap<String, MethodMeta>,
}

impl ClassDescriptor {
    pub fn builder(name: impl Into<String>, constructor: ConstructorFn) -> ClassDescriptorBuilder {
        ClassDescriptorBuilder::new(name.into(), constructor)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&MemberFn> {
        self.members.get(name)
    }

    pub fn static_fn(&self, name: &str) -> Option<&StaticFn> {
        self.statics.get(name)
    }

    pub fn is_event_source(&self, method: &str) -> bool {
        self.events.contains(method)
    }

    pub fn member_functions(&self) -> Vec<(String, usize)> {
        self.member_arity.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn static_functions(&self) -> Vec<(String, usize)> {
        self.static_arity.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    pub fn meta(&self) -> &FxHashMap<String, MethodMeta> {
        &self.meta
    }
}

pub struct ClassDescriptorBuilder {
    name: String,
    constructor: ConstructorFn,
    members: FxHashMap<String, MemberFn>,
    member_arity: FxHashMap<String, usize>,
    statics: FxHashMap<String, StaticFn>,
    static_arity: FxHashMap<String, usize>,
    events: std::collections::HashSet<String>,
    meta: FxHashMap<String, MethodMeta>,
}

impl ClassDescriptorBuilder {
    fn new(name: String, constructor: ConstructorFn) -> Self {
        ClassDescriptorBuilder {
            name,
            constructor,
            members: FxHashMap::default(),
            member_arity: FxHashMap::default(),
            statics: FxHashMap::default(),
            static_arity: FxHashMap::default(),
            events: std::collections::HashSet::new(),
            meta: FxHashMap::default(),
        }
    }

    pub fn member(mut self, name: impl Into<String>, arity: usize, f: MemberFn) -> Self {
        let name = name.into();
        self.member_arity.insert(name.clone(), arity);
        self.members.insert(name, f);
        self
    }

    pub fn static_fn(mut self, name: impl Into<String>, arity: usize, f: StaticFn) -> Self {
        let name = name.into();
        self.static_arity.insert(name.clone(), arity);
        self.statics.insert(name, f);
        self
    }

    /// Marks a previously-registered member method as an event source: its
    /// callback argument is tracked per-client and dropped on disconnect.
    pub fn event(mut self, method: impl Into<String>) -> Self {
        self.events.insert(method.into());
        self
    }

    pub fn meta(mut self, method: impl Into<String>, meta: MethodMeta) -> Self {
        self.meta.insert(method.into(), meta);
        self
    }

    pub fn build(self) -> ClassDescriptor {
        ClassDescriptor {
            name: self.name,
            constructor: self.constructor,
            members: self.members,
            member_arity: self.member_arity,
            statics: self.statics,
            static_arity: self.static_arity,
            events: self.events,
            meta: self.meta,
        }
    }
}
