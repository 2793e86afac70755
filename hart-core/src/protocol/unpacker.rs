use tracing::{trace, warn};

use super::frame::{Address, Delimiter, FrameKind};
use super::response::{Message, Request, Response, decode_response_body};
use super::*;

/// What the unpacker does with a frame it cannot decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Log the error, drop the frame and resynchronize on the next preamble.
    #[default]
    Continue,
    /// Yield the error to the caller, then resynchronize.
    Raise,
}

/// Incremental decoder for HART frames read off a byte stream.
///
/// Bytes are pushed in with [`Unpacker::feed`]; decoded messages are pulled
/// out through the [`Iterator`] impl, which returns `None` once the buffer
/// holds no further complete frame. Partial frames stay buffered until more
/// bytes arrive.
#[derive(Debug, Default)]
pub struct Unpacker {
    buf: Vec<u8>,
    on_error: OnError,
    /// `buf[0]` is a delimiter candidate; its preamble has been consumed.
    in_frame: bool,
}

enum Step {
    Incomplete,
    Frame(Message),
    Invalid(DecodeError),
}

impl Unpacker {
    pub fn new(on_error: OnError) -> Self {
        Self {
            buf: Vec::with_capacity(64),
            on_error,
            in_frame: false,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.in_frame = false;
    }

    /// Drops everything before the next delimiter candidate.
    fn sync(&mut self) -> bool {
        // a frame starts at the first non-preamble byte that follows a preamble byte
        let start = self
            .buf
            .windows(2)
            .position(|w| w[0] == PREAMBLE_BYTE && w[1] != PREAMBLE_BYTE)
            .map(|i| i + 1);

        match start {
            Some(start) => {
                self.buf.drain(..start);
                self.in_frame = true;
            }
            None => {
                let trailing_preamble = self
                    .buf
                    .iter()
                    .rev()
                    .take_while(|b| **b == PREAMBLE_BYTE)
                    .count();
                let garbage = self.buf.len() - trailing_preamble;
                if garbage > 0 {
                    trace!(garbage, "discarding bytes outside a frame");
                    self.buf.drain(..garbage);
                }
            }
        }

        self.in_frame
    }

    /// Drops the delimiter candidate so the next scan starts one byte later.
    fn resync(&mut self) {
        self.buf.drain(..1);
        self.in_frame = false;
    }

    /// Waits for the rest of the current frame, unless a complete frame
    /// already follows it. A noise delimiter with a large byte count would
    /// otherwise hold back every reply behind it.
    fn incomplete(&mut self, needed: usize) -> Step {
        let Some(start) = self.later_frame_start() else {
            return Step::Incomplete;
        };

        self.buf.drain(..start);
        self.in_frame = true;
        Step::Invalid(DecodeError::InsufficientData {
            needed,
            available: start,
        })
    }

    /// Start of the first complete, checksummed frame after `buf[0]`.
    fn later_frame_start(&self) -> Option<usize> {
        (1..self.buf.len())
            .filter(|&i| self.buf[i - 1] == PREAMBLE_BYTE && self.buf[i] != PREAMBLE_BYTE)
            .find(|&i| complete_frame_len(&self.buf[i..]).is_some())
    }

    fn step(&mut self) -> Step {
        if !self.in_frame && !self.sync() {
            return Step::Incomplete;
        }

        let delimiter = match Delimiter::try_from(self.buf[0]) {
            Ok(d) => d,
            Err(e) => {
                self.resync();
                return Step::Invalid(e);
            }
        };

        let address_size = delimiter.address_size();
        let header_len = 1 + address_size + 2;
        if self.buf.len() < header_len {
            return self.incomplete(header_len);
        }

        let byte_count = self.buf[header_len - 1] as usize;
        let total_len = header_len + byte_count + 1;
        if self.buf.len() < total_len {
            return self.incomplete(total_len);
        }

        let expected = checksum(&self.buf[..total_len - 1]);
        let actual = self.buf[total_len - 1];
        if expected != actual {
            // the delimiter may have been noise
            self.resync();
            return Step::Invalid(DecodeError::ChecksumMismatch { expected, actual });
        }

        let frame: Vec<u8> = self.buf.drain(..total_len).collect();
        self.in_frame = false;
        match decode_frame(delimiter, &frame, header_len) {
            Ok(message) => Step::Frame(message),
            Err(e) => Step::Invalid(e),
        }
    }
}

/// Length of the frame at the start of `buf` if all of it has arrived and
/// its checksum holds.
fn complete_frame_len(buf: &[u8]) -> Option<usize> {
    let delimiter = Delimiter::try_from(*buf.first()?).ok()?;
    let header_len = 1 + delimiter.address_size() + 2;
    let total_len = header_len + *buf.get(header_len - 1)? as usize + 1;
    let frame = buf.get(..total_len)?;

    (checksum(&frame[..total_len - 1]) == frame[total_len - 1]).then_some(total_len)
}

fn decode_frame(delimiter: Delimiter, frame: &[u8], header_len: usize) -> DecodeResult<Message> {
    let address = Address::from_bytes(&frame[1..header_len - 2])?;
    let command = frame[header_len - 2];
    let data = &frame[header_len..frame.len() - 1];

    match delimiter.kind {
        FrameKind::Master => Ok(Message::Request(Request {
            address,
            command,
            data: data.to_vec(),
        })),
        FrameKind::Slave | FrameKind::Burst => {
            if data.len() < RESPONSE_STATUS_SIZE {
                return Err(DecodeError::InsufficientData {
                    needed: RESPONSE_STATUS_SIZE,
                    available: data.len(),
                });
            }

            Ok(Message::Response(Response {
                address,
                command,
                burst: delimiter.kind == FrameKind::Burst,
                response_code: data[0],
                device_status: data[1],
                body: decode_response_body(command, &data[RESPONSE_STATUS_SIZE..])?,
            }))
        }
    }
}

impl Iterator for Unpacker {
    type Item = DecodeResult<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.step() {
                Step::Incomplete => return None,
                Step::Frame(message) => return Some(Ok(message)),
                Step::Invalid(e) => match self.on_error {
                    OnError::Continue => {
                        warn!(error = %e, "skipping undecodable frame");
                    }
                    OnError::Raise => return Some(Err(e)),
                },
            }
        }
    }
}
