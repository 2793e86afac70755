use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::publisher::Publish;
use crate::session::{DeviceSession, SessionError};
use crate::transport::Transport;

/// Where each reading field is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Primary variable.
    pub press: String,
    /// Scaled secondary variable.
    pub temp: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            press: "press".to_string(),
            temp: "temp".to_string(),
        }
    }
}

/// How a bridge run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Command 0 got no reply; the publisher was never created.
    DeviceNotFound,
    /// The cancellation token fired.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Identifies the device, reads its status once, then publishes command 3
/// readings until `cancel` fires.
///
/// `connect` is called only after the device has been identified. The
/// publisher it returns is shut down on every exit from the polling loop.
pub async fn run<T, P, F>(
    session: &mut DeviceSession<T>,
    topics: &Topics,
    connect: F,
    cancel: CancellationToken,
) -> Result<Outcome, BridgeError>
where
    T: Transport,
    P: Publish,
    F: FnOnce() -> P,
{
    let identified = tokio::select! {
        _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
        identified = session.run_command_0() => identified?,
    };
    if !identified {
        warn!("Failed to find and connect to the device");
        return Ok(Outcome::DeviceNotFound);
    }

    tokio::select! {
        _ = cancel.cancelled() => return Ok(Outcome::Cancelled),
        status = session.run_command_1() => status?,
    }

    let mut publisher = connect();
    let polled = poll(session, &publisher, topics, &cancel).await;
    publisher.shutdown().await;

    polled?;
    Ok(Outcome::Cancelled)
}

async fn poll<T, P>(
    session: &mut DeviceSession<T>,
    publisher: &P,
    topics: &Topics,
    cancel: &CancellationToken,
) -> Result<(), BridgeError>
where
    T: Transport,
    P: Publish,
{
    info!(press = %topics.press, temp = %topics.temp, "Polling device");

    loop {
        let reading = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Polling cancelled");
                return Ok(());
            }
            reading = session.run_command_3() => reading?,
        };

        publish_value(publisher, &topics.press, reading.primary);
        publish_value(publisher, &topics.temp, reading.secondary);
    }
}

fn publish_value<P: Publish>(publisher: &P, topic: &str, value: Option<f64>) {
    match value {
        Some(value) => {
            publisher.publish(topic, value);
        }
        None => warn!(topic, "Failed to send message: no value read"),
    }
}
