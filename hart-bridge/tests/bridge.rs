mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use hart_bridge::bridge::{self, BridgeError};
use hart_bridge::{DeviceSession, Outcome, Publish, Topics};
use tokio_util::sync::CancellationToken;

/// Records every publish and cancels the run once `limit` values were sent.
#[derive(Clone)]
struct RecordingPublisher {
    sent: Arc<Mutex<Vec<(String, f64)>>>,
    shut_down: Arc<AtomicBool>,
    cancel: CancellationToken,
    limit: usize,
}

impl RecordingPublisher {
    fn new(cancel: CancellationToken, limit: usize) -> Self {
        Self {
            sent: Arc::default(),
            shut_down: Arc::default(),
            cancel,
            limit,
        }
    }
}

#[async_trait]
impl Publish for RecordingPublisher {
    fn publish(&self, topic: &str, value: f64) -> bool {
        let mut sent = self.sent.lock().unwrap();
        sent.push((topic.to_string(), value));
        if sent.len() >= self.limit {
            self.cancel.cancel();
        }
        true
    }

    async fn shutdown(&mut self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn publishes_readings_until_cancelled() -> Result<(), BridgeError> {
    let (link, device_link) = tokio::io::duplex(1024);
    let device = FakeDevice::spawn(device_link, transmitter(1.5, 0.002));
    let mut session = DeviceSession::new(link, fast_config());

    let cancel = CancellationToken::new();
    let publisher = RecordingPublisher::new(cancel.clone(), 4);
    let probe = publisher.clone();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        bridge::run(&mut session, &Topics::default(), || publisher, cancel),
    )
    .await
    .expect("bridge stops after cancellation")?;

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(probe.shut_down.load(Ordering::SeqCst));

    let sent = probe.sent.lock().unwrap();
    assert_eq!(sent.len(), 4);
    for pair in sent.chunks(2) {
        assert_eq!(pair[0], ("press".to_string(), 1.5));
        assert_eq!(pair[1].0, "temp");
        assert!((pair[1].1 - 2000.0).abs() < 1e-3);
    }

    let commands = device.commands();
    assert_eq!(&commands[..2], &[0, 1]);
    assert!(commands[2..].iter().all(|&c| c == 3));
    Ok(())
}

#[tokio::test]
async fn missing_device_never_connects() -> Result<(), BridgeError> {
    let (link, device_link) = tokio::io::duplex(1024);
    let device = FakeDevice::spawn(device_link, silent());
    let mut session = DeviceSession::new(link, fast_config());

    let cancel = CancellationToken::new();
    let connected = AtomicBool::new(false);

    let outcome = bridge::run(
        &mut session,
        &Topics::default(),
        || {
            connected.store(true, Ordering::SeqCst);
            RecordingPublisher::new(cancel.clone(), usize::MAX)
        },
        cancel.clone(),
    )
    .await?;

    assert_eq!(outcome, Outcome::DeviceNotFound);
    assert!(!connected.load(Ordering::SeqCst));
    assert_eq!(device.commands(), vec![0]);
    Ok(())
}

#[tokio::test]
async fn cancel_before_identification() -> Result<(), BridgeError> {
    let (link, device_link) = tokio::io::duplex(1024);
    let _device = FakeDevice::spawn(device_link, transmitter(1.5, 0.002));
    let mut session = DeviceSession::new(link, fast_config());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let connected = AtomicBool::new(false);

    let outcome = bridge::run(
        &mut session,
        &Topics::default(),
        || {
            connected.store(true, Ordering::SeqCst);
            RecordingPublisher::new(CancellationToken::new(), usize::MAX)
        },
        cancel,
    )
    .await?;

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(!connected.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn empty_reading_publishes_nothing() -> Result<(), BridgeError> {
    let (link, device_link) = tokio::io::duplex(1024);
    let _device = FakeDevice::spawn(
        device_link,
        Box::new(|request| match request.command {
            0 => vec![hart_core::pack_response(
                request.address,
                request.command,
                0,
                0,
                &identity_body(MANUFACTURER_ID, DEVICE_TYPE, DEVICE_ID),
            )],
            _ => Vec::new(),
        }),
    );
    let mut session = DeviceSession::new(link, fast_config());

    let cancel = CancellationToken::new();
    let publisher = RecordingPublisher::new(cancel.clone(), usize::MAX);
    let probe = publisher.clone();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        stopper.cancel();
    });

    let outcome = bridge::run(&mut session, &Topics::default(), || publisher, cancel).await?;

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(probe.sent.lock().unwrap().is_empty());
    assert!(probe.shut_down.load(Ordering::SeqCst));
    Ok(())
}
