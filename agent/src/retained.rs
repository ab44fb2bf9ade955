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

//! Retained `__agentInfo__`/`__classInfo__` document construction.
//!
//! Centralized here so the publish-then-flag vs flag-then-publish ordering
//! rule is enforced by the caller's choice of *when* to call these, not by
//! duplicated bookkeeping at each call site.

use std::collections::BTreeMap;

use serde::Serialize;
use vrpc_core::Adapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub status: AgentStatus,
    pub hostname: String,
    pub version: String,
}

impl AgentInfo {
    pub fn new(status: AgentStatus, version: impl Into<String>) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        AgentInfo { status, hostname, version: version.into() }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("AgentInfo is always serializable")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub class_name: String,
    pub instances: Vec<String>,
    pub member_functions: Vec<String>,
    pub static_functions: Vec<String>,
    pub meta: BTreeMap<String, vrpc_core::MethodMeta>,
}

impl ClassInfo {
    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("ClassInfo is always serializable")
    }
}

fn format_signature(name: String, arity: usize) -> String {
    format!("{name}-{arity}")
}

/// Builds the retained class-info document for `class`, or `None` if it is
/// not registered.
pub fn build_class_info(adapter: &Adapter, class: &str) -> Option<ClassInfo> {
    let instances = adapter.get_available_instances(class);
    let member_functions =
        adapter.get_available_member_functions(class)?.into_iter().map(|(n, a)| format_signature(n, a)).collect();
    let static_functions =
        adapter.get_available_static_functions(class)?.into_iter().map(|(n, a)| format_signature(n, a)).collect();
    let meta = adapter.get_available_meta_data(class)?.into_iter().collect();
    Some(ClassInfo { class_name: class.to_string(), instances, member_functions, static_functions, meta })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_info_serializes_lowercase_status() {
        let info = AgentInfo::new(AgentStatus::Online, "1.0.0");
        let json = String::from_utf8(info.to_payload()).unwrap();
        assert!(json.contains("\"status\":\"online\""));
    }
}
