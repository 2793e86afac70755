#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hart_bridge::SessionConfig;
use hart_core::protocol::{
    CMD_READ_DYNAMIC_VARIABLES, CMD_READ_PRIMARY_VARIABLE, CMD_READ_UNIQUE_IDENTIFIER,
};
use hart_core::{Message, OnError, Request, Unpacker, pack_response};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

pub const MANUFACTURER_ID: u8 = 1;
pub const DEVICE_TYPE: u8 = 2;
pub const DEVICE_ID: [u8; 3] = [0, 0, 3];

pub fn fast_config() -> SessionConfig {
    SessionConfig {
        response_guard: Duration::from_millis(50),
        settle: Duration::ZERO,
        drain_idle: Duration::from_millis(10),
        ..SessionConfig::default()
    }
}

pub fn identity_body(manufacturer_id: u8, device_type: u8, device_id: [u8; 3]) -> Vec<u8> {
    let mut body = vec![254, manufacturer_id, device_type, 5, 5, 1, 1, 0x09, 0];
    body.extend_from_slice(&device_id);
    body
}

pub fn primary_body(units: u8, value: f32) -> Vec<u8> {
    let mut body = vec![units];
    body.extend_from_slice(&value.to_be_bytes());
    body
}

pub fn dynamic_body(primary: f32, secondary: f32) -> Vec<u8> {
    let mut body = 12.0f32.to_be_bytes().to_vec();
    body.push(7);
    body.extend_from_slice(&primary.to_be_bytes());
    body.push(32);
    body.extend_from_slice(&secondary.to_be_bytes());
    body
}

/// Frames a device sends back for one request.
pub type Replies = Box<dyn Fn(&Request) -> Vec<Vec<u8>> + Send>;

/// Answers commands 0, 1 and 3 the way a pressure transmitter would.
pub fn transmitter(primary: f32, secondary: f32) -> Replies {
    Box::new(move |request| {
        let body = match request.command {
            CMD_READ_UNIQUE_IDENTIFIER => identity_body(MANUFACTURER_ID, DEVICE_TYPE, DEVICE_ID),
            CMD_READ_PRIMARY_VARIABLE => primary_body(7, primary),
            CMD_READ_DYNAMIC_VARIABLES => dynamic_body(primary, secondary),
            _ => return Vec::new(),
        };
        vec![pack_response(request.address, request.command, 0, 0, &body)]
    })
}

pub fn silent() -> Replies {
    Box::new(|_| Vec::new())
}

/// Simulated field device on the far end of an in-memory link.
pub struct FakeDevice {
    pub requests: Arc<Mutex<Vec<Request>>>,
    pub task: JoinHandle<()>,
}

impl FakeDevice {
    pub fn spawn(mut link: DuplexStream, replies: Replies) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        let task = tokio::spawn(async move {
            let mut unpacker = Unpacker::new(OnError::Continue);
            let mut chunk = [0u8; 256];

            loop {
                let n = match link.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                unpacker.feed(&chunk[..n]);

                let decoded: Vec<_> = unpacker.by_ref().collect();
                for message in decoded {
                    let Ok(Message::Request(request)) = message else {
                        continue;
                    };
                    let frames = replies(&request);
                    seen.lock().unwrap().push(request);
                    for frame in frames {
                        if link.write_all(&frame).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Self { requests, task }
    }

    pub fn commands(&self) -> Vec<u8> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.command)
            .collect()
    }
}
