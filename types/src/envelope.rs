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

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::reserved::{arg_key, parse_arg_key, KEY_ERROR, KEY_RETURN};
use crate::value::Value;

/// One RPC message, in either direction.
///
/// `call` mutates an `Envelope` in place and the mutated value is published
/// back to `sender` verbatim — this is the single wire format for both
/// requests and replies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Class name (static calls, `__create__`) or instance identifier
    /// (member calls).
    pub context: String,
    /// Method name, or one of the reserved lifecycle method names.
    pub method: String,
    /// Positional arguments (`_1, _2, ...`) plus, after dispatch, `r`/`e`.
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Reply topic chosen by the caller.
    pub sender: String,
    /// Opaque caller-chosen correlation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl Envelope {
    pub fn new(context: impl Into<String>, method: impl Into<String>, sender: impl Into<String>) -> Self {
        Envelope { context: context.into(), method: method.into(), data: BTreeMap::new(), sender: sender.into(), id: None }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_arg(mut self, index: usize, value: impl Into<Value>) -> Self {
        self.data.insert(arg_key(index), value.into());
        self
    }

    /// Positional arguments in `_1, _2, ...` order, regardless of what other
    /// keys happen to be present in `data`.
    pub fn args(&self) -> Vec<&Value> {
        let mut indexed: Vec<(usize, &Value)> =
            self.data.iter().filter_map(|(k, v)| parse_arg_key(k).map(|i| (i, v))).collect();
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, v)| v).collect()
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.data.get(&arg_key(index))
    }

    pub fn set_arg(&mut self, index: usize, value: Value) {
        self.data.insert(arg_key(index), value);
    }

    /// Sets `data.r`, clearing any previously-set `data.e` (`r` and `e`
    /// are mutually exclusive).
    pub fn set_return(&mut self, value: Value) {
        self.data.remove(KEY_ERROR);
        self.data.insert(KEY_RETURN.to_string(), value);
    }

    /// Sets `data.e`, clearing any previously-set `data.r`.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.data.remove(KEY_RETURN);
        self.data.insert(KEY_ERROR.to_string(), Value::String(message.into()));
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.data.get(KEY_RETURN)
    }

    pub fn error(&self) -> Option<&str> {
        self.data.get(KEY_ERROR).and_then(Value::as_str)
    }

    pub fn is_err(&self) -> bool {
        self.data.contains_key(KEY_ERROR)
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_keys_and_scalars() {
        let env = Envelope::new("TestClass", "__create__", "s1")
            .with_id("1")
            .with_arg(1, "test")
            .with_arg(2, 42i64);
        let json = env.to_json().unwrap();
        let back = Envelope::from_json(&json).unwrap();
        assert_eq!(env, back);
    }

    #[test]
    fn args_are_ordered_by_index_not_insertion() {
        let mut env = Envelope::new("X", "m", "s1");
        env.set_arg(2, Value::from("second"));
        env.set_arg(1, Value::from("first"));
        let args = env.args();
        assert_eq!(args, vec![&Value::from("first"), &Value::from("second")]);
    }

    #[test]
    fn set_return_and_set_error_are_mutually_exclusive() {
        let mut env = Envelope::new("X", "m", "s1");
        env.set_return(Value::from(true));
        assert!(env.return_value().is_some());
        env.set_error("boom");
        assert!(env.return_value().is_none());
        assert_eq!(env.error(), Some("boom"));
    }
}
