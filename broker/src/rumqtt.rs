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

use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc;
use rumqttc::{AsyncClient, Event, LastWill as RLastWill, MqttOptions, Packet, QoS as RQoS, Transport};

use crate::client::{BrokerClient, BrokerEvent, ConnectOptions, LastWill, PublishOptions, QoS};
use crate::error::BrokerError;

fn to_rumqttc_qos(qos: QoS) -> RQoS {
    match qos {
        QoS::AtMostOnce => RQoS::AtMostOnce,
        QoS::AtLeastOnce => RQoS::AtLeastOnce,
    }
}

fn parse_broker_url(url: &str) -> (String, u16, bool) {
    let (scheme, rest) = url.split_once("://").unwrap_or(("mqtt", url));
    let secure = scheme == "mqtts" || scheme == "ssl";
    let (host, port) = rest.split_once(':').unwrap_or((rest, if secure { "8883" } else { "1883" }));
    (host.to_string(), port.parse().unwrap_or(if secure { 8883 } else { 1883 }), secure)
}

fn last_will(will: LastWill) -> RLastWill {
    RLastWill::new(will.topic, will.payload, to_rumqttc_qos(will.qos), will.retain)
}

/// `BrokerClient` backed by an MQTT v3.1.1/v5 connection via `rumqttc`.
/// Drives the `EventLoop` on a background `tokio` task and forwards
/// translated [`BrokerEvent`]s over an unbounded channel.
pub struct RumqttcBroker {
    client: AsyncClient,
}

impl RumqttcBroker {
    /// Opens a connection and returns the broker handle plus the event
    /// stream the Agent session loop reads from.
    pub fn connect(opts: ConnectOptions) -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (host, port, secure) = parse_broker_url(&opts.broker_url);
        let mut mqtt_options = MqttOptions::new(opts.client_id, host, port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(opts.clean_session);

        if let Some(credentials) = opts.credentials {
            let (username, password) = credentials.into_username_password();
            mqtt_options.set_credentials(username, password);
        }

        if let Some(will) = opts.last_will {
            mqtt_options.set_last_will(last_will(will));
        }

        if secure {
            let tls_config = if opts.insecure_tls {
                rumqttc::TlsConfiguration::SimpleNative { ca: Vec::new(), client_auth: None }
            } else {
                rumqttc::TlsConfiguration::Native
            };
            mqtt_options.set_transport(Transport::Tls(tls_config));
        }

        let (client, mut event_loop) = AsyncClient::new(mqtt_options, 128);
        let (tx, rx) = mpsc::unbounded();

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        let _ = tx.unbounded_send(BrokerEvent::Connect { session_present: ack.session_present });
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let _ = tx.unbounded_send(BrokerEvent::Message {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                            retained: publish.retain,
                        });
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        let _ = tx.unbounded_send(BrokerEvent::Close);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.unbounded_send(BrokerEvent::Error(e.to_string()));
                        let _ = tx.unbounded_send(BrokerEvent::Offline);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
            let _ = tx.unbounded_send(BrokerEvent::End);
        });

        (RumqttcBroker { client }, rx)
    }
}

#[async_trait]
impl BrokerClient for RumqttcBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>, opts: PublishOptions) -> Result<(), BrokerError> {
        let qos = to_rumqttc_qos(opts.qos.unwrap_or(QoS::AtLeastOnce));
        self.client
            .publish(topic, qos, opts.retain, payload)
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), BrokerError> {
        self.client
            .subscribe(topic, to_rumqttc_qos(qos))
            .await
            .map_err(|e| BrokerError::Subscribe(e.to_string()))
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.client.unsubscribe(topic).await.map_err(|e| BrokerError::Unsubscribe(e.to_string()))
    }

    async fn end(&self, force: bool) -> Result<(), BrokerError> {
        if force {
            self.client.disconnect().await.map_err(|e| BrokerError::Connection(e.to_string()))
        } else {
            self.client.disconnect().await.map_err(|e| BrokerError::Connection(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_url() {
        assert_eq!(parse_broker_url("mqtts://vrpc.io:8883"), ("vrpc.io".to_string(), 8883, true));
        assert_eq!(parse_broker_url("mqtt://localhost:1883"), ("localhost".to_string(), 1883, false));
        assert_eq!(parse_broker_url("mqtt://localhost"), ("localhost".to_string(), 1883, false));
    }
}
