mod error;
mod frame;
mod response;
mod unpacker;

pub use error::{DecodeError, DecodeResult};
pub use frame::{
    Address, CommandId, Delimiter, FrameKind, PollingAddress, checksum, pack_long_frame,
    pack_response, pack_short_frame,
};
pub use response::{
    DynamicVariables, Message, PrimaryVariable, Request, Response, ResponseBody,
    UniqueIdentifier, Variable,
};
pub use unpacker::{OnError, Unpacker};

pub const PREAMBLE_BYTE: u8 = 0xFF;
/// Preamble length used for short frames unless the caller overrides it.
pub const DEFAULT_SHORT_PREAMBLE_LEN: usize = 20;
pub const LONG_PREAMBLE_LEN: usize = 5;
/// Primary master bit, set in the first address byte of outgoing frames.
pub const MASTER_BIT: u8 = 0x80;
pub const BURST_BIT: u8 = 0x40;
pub const SHORT_ADDRESS_SIZE: usize = 1;
pub const LONG_ADDRESS_SIZE: usize = 5;
/// Delimiter + command + byte count + checksum.
pub const FRAME_OVERHEAD: usize = 4;
/// Slave responses start with a response code and a device status byte.
pub const RESPONSE_STATUS_SIZE: usize = 2;

pub const CMD_READ_UNIQUE_IDENTIFIER: u8 = 0;
pub const CMD_READ_PRIMARY_VARIABLE: u8 = 1;
pub const CMD_READ_DYNAMIC_VARIABLES: u8 = 3;
