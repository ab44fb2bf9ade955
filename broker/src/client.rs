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

use async_trait::async_trait;

use crate::error::BrokerError;

/// Quality of service a publish or subscription uses. QoS 1 by default,
/// downgraded to QoS 0 under `bestEffort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

impl QoS {
    pub fn from_best_effort(best_effort: bool) -> Self {
        if best_effort {
            QoS::AtMostOnce
        } else {
            QoS::AtLeastOnce
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    pub qos: Option<QoS>,
    pub retain: bool,
}

impl PublishOptions {
    pub fn retained(qos: QoS) -> Self {
        PublishOptions { qos: Some(qos), retain: true }
    }

    pub fn plain(qos: QoS) -> Self {
        PublishOptions { qos: Some(qos), retain: false }
    }
}

/// A last-will publication declared at connect time.
#[derive(Debug, Clone)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// How the client authenticates with the broker.
#[derive(Debug, Clone)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },
    Token(String),
}

impl Credentials {
    pub fn into_username_password(self) -> (String, String) {
        match self {
            Credentials::UsernamePassword { username, password } => (username, password),
            Credentials::Token(token) => ("__token__".to_string(), token),
        }
    }
}

/// Options needed to open a broker connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub client_id: String,
    pub broker_url: String,
    pub credentials: Option<Credentials>,
    pub clean_session: bool,
    pub last_will: Option<LastWill>,
    /// Tolerate invalid/self-signed TLS certificates.
    pub insecure_tls: bool,
}

/// An event surfaced by the broker connection.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    Connect { session_present: bool },
    Reconnect,
    Message { topic: String, payload: Vec<u8>, retained: bool },
    Close,
    Offline,
    Error(String),
    End,
}

/// The publish/subscribe capability the Agent consumes.
///
/// Modeled as a trait so the Agent's session logic can be driven by an
/// in-memory fake in tests, the same way `jsonrpsee-client-transport`
/// abstracts the wire transport behind a trait the ws/http clients share.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, opts: PublishOptions) -> Result<(), BrokerError>;
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError>;
    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError>;
    /// Closes the connection. `force` skips waiting for in-flight publishes
    /// to flush.
    async fn end(&self, force: bool) -> Result<(), BrokerError>;
}
