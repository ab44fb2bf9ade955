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

use vrpc_types::reserved::{TOPIC_AGENT_INFO, TOPIC_CLASS_INFO, TOPIC_CLIENT_INFO, TOPIC_STATIC};

/// The bit-exact topic scheme.
pub fn agent_info_topic(domain: &str, agent: &str) -> String {
    format!("{domain}/{agent}/{TOPIC_AGENT_INFO}")
}

pub fn class_info_topic(domain: &str, agent: &str, class: &str) -> String {
    format!("{domain}/{agent}/{class}/{TOPIC_CLASS_INFO}")
}

pub fn static_wildcard(domain: &str, agent: &str, class: &str) -> String {
    format!("{domain}/{agent}/{class}/{TOPIC_STATIC}/+")
}

pub fn instance_wildcard(domain: &str, agent: &str, class: &str, instance: &str) -> String {
    format!("{domain}/{agent}/{class}/{instance}/+")
}

pub fn client_info_topic(client_id: &str) -> String {
    format!("{client_id}/{TOPIC_CLIENT_INFO}")
}

/// Recognizes a `{clientId}/__clientInfo__` topic and extracts `clientId`.
/// Client ids never contain `/`, so a two-segment topic ending in the
/// reserved leaf is unambiguous.
pub fn parse_client_info_topic(topic: &str) -> Option<&str> {
    let (client_id, leaf) = topic.split_once('/')?;
    if leaf == TOPIC_CLIENT_INFO {
        Some(client_id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_bit_exact_topics() {
        assert_eq!(agent_info_topic("d", "a"), "d/a/__agentInfo__");
        assert_eq!(class_info_topic("d", "a", "C"), "d/a/C/__classInfo__");
        assert_eq!(static_wildcard("d", "a", "C"), "d/a/C/__static__/+");
        assert_eq!(instance_wildcard("d", "a", "C", "x1"), "d/a/C/x1/+");
        assert_eq!(client_info_topic("clientA"), "clientA/__clientInfo__");
    }

    #[test]
    fn recognizes_client_info_topics() {
        assert_eq!(parse_client_info_topic("clientA/__clientInfo__"), Some("clientA"));
        assert_eq!(parse_client_info_topic("d/a/C/__classInfo__"), None);
        assert_eq!(parse_client_info_topic("clientA"), None);
    }
}
