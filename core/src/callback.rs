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

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_channel::mpsc;
use vrpc_types::{reserved::arg_key, Envelope, Value};

/// Sink that receives encoded callback/promise invocations emitted during or
/// after a dispatch (`onCallback`).
///
/// Mirrors `jsonrpsee_core::server::helpers::MethodSink`, which wraps an
/// `mpsc::UnboundedSender<String>` the same way.
#[derive(Clone)]
pub struct CallbackSink {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl CallbackSink {
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        CallbackSink { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded();
        (CallbackSink::new(tx), rx)
    }

    /// Emits an already-built envelope. Returns `false` if the receiving end
    /// (the Agent) has been dropped; callers log a warning and move on —
    /// transport failures never invent a reply.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.tx.unbounded_send(envelope).is_ok()
    }
}

/// A resolved `__f__<id>` or `__p__<id>` placeholder.
///
/// When invoked, encodes `args` into a fresh envelope addressed back to the
/// `sender` of the call that produced this handle, and emits it through the
/// [`CallbackSink`] installed on the adapter.
#[derive(Clone)]
pub struct CallbackHandle {
    sink: CallbackSink,
    sender: String,
    /// The exact string placed in the emitted envelope's `id` field: the
    /// bare id for a caller-supplied `__f__<id>` placeholder, or the full
    /// `__p__<n>` tag for an adapter-generated promise.
    reply_id: String,
    /// Cleared by `disable()` when an event subscription this handle backs
    /// is detached; every emit afterward becomes a silent no-op instead of
    /// reaching a client that is no longer listening.
    active: Arc<AtomicBool>,
}

impl CallbackHandle {
    pub fn new(sink: CallbackSink, sender: String, reply_id: String) -> Self {
        CallbackHandle { sink, sender, reply_id, active: Arc::new(AtomicBool::new(true)) }
    }

    pub fn reply_id(&self) -> &str {
        &self.reply_id
    }

    /// Permanently stops this handle from emitting. Called through the
    /// [`EventDisposer`](crate::descriptor::EventDisposer) built from the
    /// same handle at subscription time.
    pub fn disable(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Emits a callback invocation carrying `args` as positional arguments.
    /// Returns `false` without sending if the handle has been disabled.
    pub fn emit(&self, args: Vec<Value>) -> bool {
        if !self.active.load(Ordering::Relaxed) {
            return false;
        }
        let mut data = BTreeMap::new();
        for (i, v) in args.into_iter().enumerate() {
            data.insert(arg_key(i + 1), v);
        }
        let envelope = Envelope {
            context: String::new(),
            method: String::new(),
            data,
            sender: self.sender.clone(),
            id: Some(Value::String(self.reply_id.clone())),
        };
        self.sink.send(envelope)
    }

    /// Emits a single-shot promise resolution: `data.r = value`.
    pub fn resolve(&self, value: Value) -> bool {
        self.emit_outcome(Ok(value))
    }

    /// Emits a single-shot promise rejection: `data.e = message`.
    pub fn reject(&self, message: impl Into<String>) -> bool {
        self.emit_outcome(Err(message.into()))
    }

    fn emit_outcome(&self, outcome: Result<Value, String>) -> bool {
        if !self.active.load(Ordering::Relaxed) {
            return false;
        }
        let mut data = BTreeMap::new();
        match outcome {
            Ok(v) => {
                data.insert("r".to_string(), v);
            }
            Err(e) => {
                data.insert("e".to_string(), Value::String(e));
            }
        }
        let envelope = Envelope {
            context: String::new(),
            method: String::new(),
            data,
            sender: self.sender.clone(),
            id: Some(Value::String(self.reply_id.clone())),
        };
        self.sink.send(envelope)
    }
}
