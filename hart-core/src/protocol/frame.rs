use super::{error::DecodeResult, *};
use crate::LongAddress;

// frame structure : preamble(n) + delimiter(1) + address(1|5) + command(1) + byte count(1) + data + checksum(1)

/// One-byte polling address carried by short frames.
///
/// HART 6/7 devices answer on 0..=63; the value is not range-checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollingAddress(pub u8);

impl From<u8> for PollingAddress {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<[u8; 1]> for PollingAddress {
    fn from(value: [u8; 1]) -> Self {
        Self(u8::from_be_bytes(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(pub u8);

impl From<u8> for CommandId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<[u8; 1]> for CommandId {
    fn from(value: [u8; 1]) -> Self {
        Self(value[0])
    }
}

/// Direction / purpose of a frame, encoded in the low three delimiter bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Burst frame sent unsolicited by a slave.
    Burst = 0x01,
    /// Master to slave request.
    Master = 0x02,
    /// Slave to master response.
    Slave = 0x06,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter {
    pub kind: FrameKind,
    pub long_address: bool,
}

impl Delimiter {
    pub fn new(kind: FrameKind, long_address: bool) -> Self {
        Self { kind, long_address }
    }

    pub fn to_byte(self) -> u8 {
        let long = if self.long_address { 0x80 } else { 0x00 };
        long | self.kind as u8
    }

    pub fn address_size(self) -> usize {
        if self.long_address {
            LONG_ADDRESS_SIZE
        } else {
            SHORT_ADDRESS_SIZE
        }
    }
}

impl TryFrom<u8> for Delimiter {
    type Error = DecodeError;

    /// Expansion bytes and non-asynchronous physical layers are not supported.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value & 0x78 != 0 {
            return Err(DecodeError::InvalidDelimiter(value));
        }

        let kind = match value & 0x07 {
            0x01 => FrameKind::Burst,
            0x02 => FrameKind::Master,
            0x06 => FrameKind::Slave,
            _ => return Err(DecodeError::InvalidDelimiter(value)),
        };

        Ok(Self {
            kind,
            long_address: value & 0x80 != 0,
        })
    }
}

/// Address field of a decoded frame, with the master and burst bits removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Short(PollingAddress),
    Long(LongAddress),
}

impl Address {
    pub(crate) fn from_bytes(bytes: &[u8]) -> DecodeResult<Self> {
        match *bytes {
            [short] => Ok(Address::Short(PollingAddress(short & 0x3F))),
            [first, b1, b2, b3, b4] => Ok(Address::Long(LongAddress::from_bytes([
                first & 0x3F,
                b1,
                b2,
                b3,
                b4,
            ]))),
            _ => Err(DecodeError::InsufficientData {
                needed: LONG_ADDRESS_SIZE,
                available: bytes.len(),
            }),
        }
    }
}

/// XOR of every byte, the HART longitudinal parity.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Builds a master request addressed by polling address.
///
/// The checksum covers everything after the preamble. A `data` payload longer
/// than 255 bytes is not rejected: its byte count is truncated to the low
/// eight bits, producing a frame the device will not accept.
pub fn pack_short_frame(
    address: impl Into<PollingAddress>,
    command_id: impl Into<CommandId>,
    preamble_len: usize,
    data: Option<&[u8]>,
) -> Vec<u8> {
    let address = address.into();
    let mut frame = with_preamble(preamble_len, SHORT_ADDRESS_SIZE, data);

    frame.push(Delimiter::new(FrameKind::Master, false).to_byte());
    frame.push(MASTER_BIT | address.0);
    push_body(&mut frame, command_id.into(), data);
    frame.push(checksum(&frame[preamble_len..]));

    frame
}

/// Builds a master request addressed by the device's long address.
pub fn pack_long_frame(
    address: LongAddress,
    command_id: impl Into<CommandId>,
    data: Option<&[u8]>,
) -> Vec<u8> {
    let mut frame = with_preamble(LONG_PREAMBLE_LEN, LONG_ADDRESS_SIZE, data);

    let mut address = address.to_bytes();
    address[0] |= MASTER_BIT;

    frame.push(Delimiter::new(FrameKind::Master, true).to_byte());
    frame.extend_from_slice(&address);
    push_body(&mut frame, command_id.into(), data);
    frame.push(checksum(&frame[LONG_PREAMBLE_LEN..]));

    frame
}

/// Builds a slave reply to the primary master, as a field device would send it.
///
/// `body` is the command data that follows the two status bytes.
pub fn pack_response(
    address: Address,
    command_id: impl Into<CommandId>,
    response_code: u8,
    device_status: u8,
    body: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(RESPONSE_STATUS_SIZE + body.len());
    data.push(response_code);
    data.push(device_status);
    data.extend_from_slice(body);

    let mut frame = with_preamble(LONG_PREAMBLE_LEN, LONG_ADDRESS_SIZE, Some(&data));
    match address {
        Address::Short(polling) => {
            frame.push(Delimiter::new(FrameKind::Slave, false).to_byte());
            frame.push(MASTER_BIT | polling.0);
        }
        Address::Long(long) => {
            let mut bytes = long.to_bytes();
            bytes[0] |= MASTER_BIT;
            frame.push(Delimiter::new(FrameKind::Slave, true).to_byte());
            frame.extend_from_slice(&bytes);
        }
    }
    push_body(&mut frame, command_id.into(), Some(&data));
    frame.push(checksum(&frame[LONG_PREAMBLE_LEN..]));

    frame
}

fn with_preamble(preamble_len: usize, address_size: usize, data: Option<&[u8]>) -> Vec<u8> {
    let data_len = data.map_or(0, <[u8]>::len);
    let mut frame = Vec::with_capacity(preamble_len + FRAME_OVERHEAD + address_size + data_len);
    frame.resize(preamble_len, PREAMBLE_BYTE);
    frame
}

fn push_body(frame: &mut Vec<u8>, command_id: CommandId, data: Option<&[u8]>) {
    frame.push(command_id.0);
    match data {
        None => frame.push(0),
        Some(data) => {
            frame.push(data.len() as u8);
            frame.extend_from_slice(data);
        }
    }
}
