//! Telemetry sink for decoded readings.
//!
//! Readings go to the Cayenne MQTT broker using its plain-text payload
//! convention. One message per present probe plus one for battery:
//!
//! - `v1/{username}/things/{topic}/data/{probe}` carries `temp,f=<value>`
//!   with the raw device units (Fahrenheit by device convention);
//! - `v1/{username}/things/{topic}/data/1` carries `batt,v=<fraction>`
//!   with battery as a normalized 0.0-1.0 value.
//!
//! Probes with no physical probe attached are skipped entirely, never
//! published as zero. `{topic}` is the device's configured channel-group
//! segment, so multiple grills under one account do not collide.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::config::CayenneConfig;
use crate::error::{Error, Result};
use crate::reading::Reading;

/// A sink that accepts one decoded reading per poll cycle.
///
/// Publishing is fire-and-forget: the call enqueues and returns, and any
/// failure is handled by the caller exactly like a transport failure.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Publish one reading under the given channel-group segment.
    async fn publish(&self, reading: &Reading, topic: &str) -> Result<()>;
}

/// Telemetry sink backed by the Cayenne MQTT broker.
pub struct CayenneClient {
    client: AsyncClient,
    username: String,
}

impl CayenneClient {
    /// Connect to the configured broker.
    ///
    /// Spawns a background task driving the MQTT event loop; the client
    /// reconnects on its own, so a broker outage surfaces as failed
    /// publishes rather than a dead sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublishFailed`] if the broker URL does not parse.
    pub fn connect(config: &CayenneConfig) -> Result<Self> {
        let (host, port, use_tls) =
            parse_broker_url(&config.broker).map_err(|reason| Error::PublishFailed { reason })?;

        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_credentials(&config.username, &config.password);
        if use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);

        info!("Connecting to Cayenne broker {}", config.broker);

        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("Cayenne broker connected: {:?}", ack.code);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Cayenne connection error: {}. Reconnecting...", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        Ok(Self {
            client,
            username: config.username.clone(),
        })
    }

    /// Send an MQTT disconnect after the workers have stopped.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Error disconnecting Cayenne client: {}", e);
        }
    }
}

#[async_trait]
impl TelemetrySink for CayenneClient {
    async fn publish(&self, reading: &Reading, topic: &str) -> Result<()> {
        for (message_topic, payload) in channel_messages(&self.username, topic, reading) {
            self.client
                .publish(&message_topic, QoS::AtMostOnce, false, payload.as_bytes())
                .await
                .map_err(|e| Error::PublishFailed {
                    reason: e.to_string(),
                })?;
            debug!("Published {} to {}", payload, message_topic);
        }
        Ok(())
    }
}

/// Assemble the Cayenne messages for one reading, probes in index order,
/// battery last.
fn channel_messages(username: &str, topic: &str, reading: &Reading) -> Vec<(String, String)> {
    let mut messages = Vec::new();

    for (probe, temperature) in reading.attached_probes() {
        messages.push((
            data_topic(username, topic, u16::from(probe)),
            format!("temp,f={}", temperature),
        ));
    }

    // Battery rides channel 1 as a voltage-typed fraction
    messages.push((
        data_topic(username, topic, 1),
        format!("batt,v={}", reading.battery_fraction()),
    ));

    messages
}

fn data_topic(username: &str, topic: &str, channel: u16) -> String {
    format!("v1/{}/things/{}/data/{}", username, topic, channel)
}

/// Parse an MQTT broker URL into (host, port, use_tls).
pub(crate) fn parse_broker_url(url: &str) -> std::result::Result<(String, u16, bool), String> {
    let (use_tls, rest) = if let Some(stripped) = url.strip_prefix("mqtt://") {
        (false, stripped)
    } else if let Some(stripped) = url.strip_prefix("mqtts://") {
        (true, stripped)
    } else {
        return Err("invalid scheme: URL must start with mqtt:// or mqtts://".to_string());
    };

    let default_port = if use_tls { 8883 } else { 1883 };

    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| format!("invalid port: {}", p))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err("host cannot be empty".to_string());
    }

    Ok((host, port, use_tls))
}
