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

//! Reserved identifiers that are part of the wire contract.
//!
//! Every string here must be preserved bit-for-bit; other crates should
//! reference these constants rather than repeating the literals.

/// Constructs an anonymous instance.
pub const METHOD_CREATE: &str = "__create__";
/// Constructs (or returns) a named instance.
pub const METHOD_CREATE_NAMED: &str = "__createNamed__";
/// Resolves an existing named instance.
pub const METHOD_GET_NAMED: &str = "__getNamed__";
/// Destroys an instance, anonymous or named.
pub const METHOD_DELETE: &str = "__delete__";
/// Invokes a method on every instance of a class.
pub const METHOD_CALL_ALL: &str = "__callAll__";

/// All reserved lifecycle method names, in no particular order.
pub const LIFECYCLE_METHODS: &[&str] =
    &[METHOD_CREATE, METHOD_CREATE_NAMED, METHOD_GET_NAMED, METHOD_DELETE, METHOD_CALL_ALL];

/// Data key prefix for positional arguments (`_1`, `_2`, ...).
pub const ARG_PREFIX: &str = "_";
/// Data key carrying the return value after dispatch.
pub const KEY_RETURN: &str = "r";
/// Data key carrying the error string after dispatch.
pub const KEY_ERROR: &str = "e";

/// Placeholder tag prefix for callback arguments.
pub const CALLBACK_TAG_PREFIX: &str = "__f__";
/// Placeholder tag prefix for promise/deferred-result arguments.
pub const PROMISE_TAG_PREFIX: &str = "__p__";
/// Sentinel substituted for a return value that failed to serialize.
pub const NOT_SERIALIZABLE: &str = "__vrpc::not-serializable__";

/// Retained agent status topic leaf.
pub const TOPIC_AGENT_INFO: &str = "__agentInfo__";
/// Retained class info topic leaf.
pub const TOPIC_CLASS_INFO: &str = "__classInfo__";
/// Static dispatch topic segment.
pub const TOPIC_STATIC: &str = "__static__";
/// Client presence topic leaf.
pub const TOPIC_CLIENT_INFO: &str = "__clientInfo__";

/// Builds the positional argument key for index `n` (1-based).
pub fn arg_key(n: usize) -> String {
    format!("{ARG_PREFIX}{n}")
}

/// Parses a positional argument key (`_1`, `_2`, ...) back into its index.
pub fn parse_arg_key(key: &str) -> Option<usize> {
    key.strip_prefix(ARG_PREFIX)?.parse().ok()
}

/// True if `method` is one of the reserved lifecycle methods.
pub fn is_lifecycle_method(method: &str) -> bool {
    LIFECYCLE_METHODS.contains(&method)
}

/// Builds a callback placeholder tag for `id`, e.g. `__f__cb-1`.
pub fn callback_tag(id: &str) -> String {
    format!("{CALLBACK_TAG_PREFIX}{id}")
}

/// Builds a promise placeholder tag for `id`, e.g. `__p__3`.
pub fn promise_tag(id: impl std::fmt::Display) -> String {
    format!("{PROMISE_TAG_PREFIX}{id}")
}

/// Strips the `__f__` prefix if present, returning the callback id.
pub fn parse_callback_tag(s: &str) -> Option<&str> {
    s.strip_prefix(CALLBACK_TAG_PREFIX)
}

/// Strips the `__p__` prefix if present, returning the promise id.
pub fn parse_promise_tag(s: &str) -> Option<&str> {
    s.strip_prefix(PROMISE_TAG_PREFIX)
}

/// Derives the RPC-client id a reply topic belongs to. Reply topics are
/// conventionally prefixed with the client's own id (the segment before the
/// first `/`), the same segment used to build `{clientId}/__clientInfo__`.
pub fn client_id_of_sender(sender: &str) -> String {
    sender.split('/').next().unwrap_or(sender).to_string()
}

#[cfg(test)]
mod client_id_tests {
    use super::*;

    #[test]
    fn takes_leading_segment() {
        assert_eq!(client_id_of_sender("clientA/replies/42"), "clientA");
        assert_eq!(client_id_of_sender("clientA"), "clientA");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_key_roundtrip() {
        for n in 1..10 {
            assert_eq!(parse_arg_key(&arg_key(n)), Some(n));
        }
    }

    #[test]
    fn rejects_non_arg_keys() {
        assert_eq!(parse_arg_key("r"), None);
        assert_eq!(parse_arg_key("e"), None);
        assert_eq!(parse_arg_key("_"), None);
        assert_eq!(parse_arg_key("_x"), None);
    }
}
