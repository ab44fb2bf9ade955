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

//! Registers a `Temperature` class on a vrpc agent and serves it until
//! interrupted, then performs a clean unregister-and-disconnect shutdown.
//!
//! ```text
//! VRPC_DOMAIN=demo VRPC_AGENT=temperature-sensor cargo run --bin basic_agent
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use vrpc::agent::{Agent, AgentConfig, AgentEvent};
use vrpc::core::{Arg, ClassDescriptor, ConstructorFn, MemberFn, MethodMeta, Outcome, ParamMeta};
use vrpc::Value;

struct Temperature {
    celsius: AtomicI64,
    labels: Mutex<HashMap<String, Value>>,
}

fn temperature_descriptor() -> ClassDescriptor {
    let constructor: ConstructorFn = Arc::new(|args| {
        let start = args.first().and_then(|v| i64::try_from(v.clone()).ok()).unwrap_or(20);
        Ok(Arc::new(Temperature { celsius: AtomicI64::new(start), labels: Mutex::new(HashMap::new()) })
            as Arc<dyn std::any::Any + Send + Sync>)
    });

    let read: MemberFn = Arc::new(|object, _args| {
        let this = object.downcast_ref::<Temperature>().expect("Temperature instance");
        Ok(Outcome::Value(Value::Number(this.celsius.load(Ordering::Relaxed).into())))
    });

    let set: MemberFn = Arc::new(|object, args| {
        let this = object.downcast_ref::<Temperature>().expect("Temperature instance");
        let value = args
            .first()
            .and_then(Arg::as_value)
            .and_then(|v| i64::try_from(v.clone()).ok())
            .ok_or("setCelsius needs an int")?;
        this.celsius.store(value, Ordering::Relaxed);
        Ok(Outcome::Value(Value::Null))
    });

    let label: MemberFn = Arc::new(|object, args| {
        let this = object.downcast_ref::<Temperature>().expect("Temperature instance");
        let key = args.first().and_then(Arg::as_value).and_then(Value::as_str).unwrap_or_default().to_string();
        let value = args.get(1).and_then(Arg::as_value).cloned().unwrap_or(Value::Null);
        this.labels.lock().insert(key, value);
        Ok(Outcome::Value(Value::Bool(true)))
    });

    ClassDescriptor::builder("Temperature", constructor)
        .member("readCelsius", 0, read)
        .member("setCelsius", 1, set)
        .member("label", 2, label)
        .meta(
            "readCelsius",
            MethodMeta { description: Some("Current reading in Celsius".into()), params: vec![], returns: Some("number".into()) },
        )
        .meta(
            "setCelsius",
            MethodMeta {
                description: Some("Overrides the current reading".into()),
                params: vec![ParamMeta { name: "value".into(), ty: "number".into() }],
                returns: None,
            },
        )
        .build()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let domain = std::env::var("VRPC_DOMAIN").unwrap_or_else(|_| "demo".to_string());
    let agent_name = std::env::var("VRPC_AGENT").unwrap_or_else(|_| "temperature-sensor".to_string());
    let broker = std::env::var("VRPC_BROKER").unwrap_or_else(|_| "mqtt://localhost:1883".to_string());

    let config = AgentConfig::new(domain, agent_name).with_broker(broker).with_version(env!("CARGO_PKG_VERSION"));
    let agent = Arc::new(Agent::new(config).context("invalid agent configuration")?);
    agent.register(temperature_descriptor());

    let mut events = agent.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                AgentEvent::Connect => tracing::info!("connected to broker"),
                AgentEvent::Reconnect => tracing::info!("reconnected to broker"),
                AgentEvent::Offline => tracing::warn!("broker reports offline"),
                AgentEvent::Error(message) => tracing::error!(%message, "broker error"),
                AgentEvent::Close => tracing::info!("connection closed"),
                AgentEvent::End => {
                    tracing::info!("agent session ended");
                    break;
                }
            }
        }
    });

    let serving = {
        let agent = Arc::clone(&agent);
        tokio::spawn(async move { agent.serve().await })
    };

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    agent.end(true).await.context("agent shutdown failed")?;
    serving.await.context("agent task panicked")??;

    Ok(())
}
