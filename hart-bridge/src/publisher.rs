use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use crate::config::MqttConfig;

/// Pause before the network loop polls again after a connection error.
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// How long shutdown waits for the network loop to flush DISCONNECT.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Sink for readings.
///
/// `publish` hands a value over for delivery and reports only whether it was
/// accepted locally. `shutdown` releases whatever the sink holds open.
#[async_trait]
pub trait Publish: Send {
    fn publish(&self, topic: &str, value: f64) -> bool;

    async fn shutdown(&mut self);
}

/// Broker address, credentials and client tuning.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub broker: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub keep_alive: Duration,
    pub channel_capacity: usize,
}

impl MqttSettings {
    pub fn new(
        broker: String,
        port: u16,
        username: String,
        password: String,
        config: &MqttConfig,
    ) -> Self {
        Self {
            broker,
            port,
            username,
            password,
            client_id: config.client_id.clone(),
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            channel_capacity: config.channel_capacity,
        }
    }
}

/// MQTT client with its network loop running on a background task.
///
/// The loop starts in [`MqttPublisher::connect`]. [`Publish::shutdown`]
/// sends DISCONNECT and stops it; dropping the publisher stops it without
/// telling the broker.
pub struct MqttPublisher {
    client: AsyncClient,
    cancel: CancellationToken,
    network: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Configures the client and starts its network loop. Connection
    /// failures are logged by the loop and never returned here.
    pub fn connect(settings: &MqttSettings) -> Self {
        let mut options = MqttOptions::new(
            settings.client_id.clone(),
            settings.broker.clone(),
            settings.port,
        );
        options.set_credentials(settings.username.clone(), settings.password.clone());
        options.set_keep_alive(settings.keep_alive);

        let (client, event_loop) = AsyncClient::new(options, settings.channel_capacity);
        let cancel = CancellationToken::new();
        let network = tokio::spawn(run_network_loop(event_loop, cancel.clone()));

        info!(
            broker = %settings.broker,
            port = settings.port,
            client_id = %settings.client_id,
            "MQTT network loop started"
        );

        Self {
            client,
            cancel,
            network: Some(network),
        }
    }
}

#[async_trait]
impl Publish for MqttPublisher {
    fn publish(&self, topic: &str, value: f64) -> bool {
        let payload = format_payload(value);

        match self
            .client
            .try_publish(topic, QoS::AtMostOnce, false, payload.clone())
        {
            Ok(()) => {
                info!(topic, payload = %payload, "Sent reading");
                true
            }
            Err(e) => {
                warn!(topic, error = %e, "Failed to send message");
                false
            }
        }
    }

    async fn shutdown(&mut self) {
        let Some(mut network) = self.network.take() else {
            return;
        };

        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "Failed to queue MQTT disconnect");
        }

        let joined = match tokio::time::timeout(DISCONNECT_TIMEOUT, &mut network).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("MQTT disconnect not flushed in time");
                self.cancel.cancel();
                network.await
            }
        };
        self.cancel.cancel();

        if let Err(e) = joined {
            error!(error = ?e, "MQTT network loop panicked");
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Bare number, always with a fractional part (`2000.0`, not `2000`).
pub fn format_payload(value: f64) -> String {
    format!("{value:?}")
}

async fn run_network_loop(mut event_loop: EventLoop, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("MQTT network loop stopped");
                break;
            }
            event = event_loop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            info!("Connected to MQTT broker");
                        } else {
                            warn!(code = ?ack.code, "Failed to connect to MQTT broker");
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        info!("Disconnected from MQTT broker");
                        break;
                    }
                    Ok(event) => trace!(?event, "MQTT event"),
                    Err(e) => {
                        match &e {
                            ConnectionError::ConnectionRefused(code) => {
                                warn!(?code, "Failed to connect to MQTT broker");
                            }
                            _ => error!(error = %e, "MQTT connection error"),
                        }

                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("MQTT network loop stopped");
                                break;
                            }
                            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
                        }
                    }
                }
            }
        }
    }
}
