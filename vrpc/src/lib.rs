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

//! Facade crate re-exporting the vrpc workspace: the wire codec
//! ([`vrpc_types`]), the adapter/registry ([`vrpc_core`]), the broker
//! capability ([`vrpc_broker`]) and the agent session ([`vrpc_agent`])
//! behind a single set of feature flags, the way the `jsonrpsee` facade
//! crate re-exports its own client/server/core crates.

#[cfg(feature = "types")]
pub use vrpc_types as types;

#[cfg(feature = "core")]
pub use vrpc_core as core;

#[cfg(feature = "broker")]
pub use vrpc_broker as broker;

#[cfg(feature = "agent")]
pub use vrpc_agent as agent;

#[cfg(feature = "types")]
pub use vrpc_types::{CodecError, Envelope, Value, ValueError};

#[cfg(feature = "core")]
pub use vrpc_core::{
    Adapter, AdapterError, Arg, ClassDescriptor, ClassDescriptorBuilder, LifecycleEvent, MethodMeta, Outcome,
    ParamMeta,
};

#[cfg(feature = "broker")]
pub use vrpc_broker::{BrokerClient, BrokerError, BrokerEvent, Credentials, QoS};

#[cfg(feature = "agent")]
pub use vrpc_agent::{Agent, AgentConfig, AgentError, AgentEvent, AgentState};
