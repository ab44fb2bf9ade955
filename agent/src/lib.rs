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

//! Agent session: broker connection lifecycle, the bit-exact topic scheme,
//! and client/instance tracking, built on top of [`vrpc_core::Adapter`].

mod config;
mod error;
mod ids;
mod retained;
mod session;
mod state;
mod topics;
mod tracker;

pub use config::AgentConfig;
pub use error::{AgentError, ConfigError};
pub use ids::derive_client_id;
pub use retained::{AgentInfo, AgentStatus, ClassInfo};
pub use session::{bridge_events, Agent, BrokerFactory, RumqttcFactory};
pub use state::{AgentEvent, AgentState};
pub use topics::{
    agent_info_topic, class_info_topic, client_info_topic, instance_wildcard, parse_client_info_topic,
    static_wildcard,
};
pub use tracker::{ClientTracker, TrackOutcome, UntrackOutcome};
