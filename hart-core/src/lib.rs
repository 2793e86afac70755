pub mod protocol;

pub use protocol::{
    Address, CommandId, DecodeError, DynamicVariables, Message, OnError, PollingAddress,
    PrimaryVariable, Request, Response, ResponseBody, UniqueIdentifier, Unpacker, Variable,
    checksum, pack_long_frame, pack_response, pack_short_frame,
};

use serde::{Deserialize, Serialize};

/// Manufacturer-assigned 24-bit device serial, as sent in the command 0 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub [u8; 3]);

impl DeviceId {
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes([0, self.0[0], self.0[1], self.0[2]])
    }
}

impl From<u32> for DeviceId {
    /// Keeps the low 24 bits.
    fn from(value: u32) -> Self {
        let [_, a, b, c] = value.to_be_bytes();
        Self([a, b, c])
    }
}

/// HART engineering unit code (common table 2). Kept raw; only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitCode(pub u8);

/// Identity of a field device, read once from its command 0 response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Manufacturer identification code.
    pub manufacturer_id: u8,
    /// Manufacturer's device type code.
    pub device_type: u8,
    /// Unique device serial within the manufacturer and device type.
    pub device_id: DeviceId,
}

/// Unique 38-bit address used by long frames.
///
/// Stored without the master and burst bits; those are added by the frame
/// packer for the direction being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LongAddress(pub u64);

impl LongAddress {
    /// Low six bits of the manufacturer id, then device type and device id.
    pub fn from_identity(identity: &DeviceIdentity) -> Self {
        let manufacturer = u64::from(identity.manufacturer_id & 0x3F);
        let device_type = u64::from(identity.device_type);
        let device_id = u64::from(identity.device_id.as_u32());

        Self(manufacturer << 32 | device_type << 24 | device_id)
    }

    pub fn to_bytes(self) -> [u8; 5] {
        let b = self.0.to_be_bytes();
        [b[3], b[4], b[5], b[6], b[7]]
    }

    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        Self(u64::from_be_bytes([
            0, 0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4],
        ]))
    }
}

impl std::fmt::Display for LongAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:010X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_address_from_identity() {
        let identity = DeviceIdentity {
            manufacturer_id: 1,
            device_type: 2,
            device_id: DeviceId([0, 0, 3]),
        };

        let address = LongAddress::from_identity(&identity);

        assert_eq!(address.to_bytes(), [0x01, 0x02, 0x00, 0x00, 0x03]);
        assert_eq!(address.to_string(), "0102000003");
    }

    #[test]
    fn long_address_drops_master_and_burst_bits() {
        let identity = DeviceIdentity {
            manufacturer_id: 0xC1,
            device_type: 0x10,
            device_id: DeviceId([0xAB, 0xCD, 0xEF]),
        };

        let address = LongAddress::from_identity(&identity);

        assert_eq!(address.to_bytes()[0], 0x01);
        assert_eq!(LongAddress::from_bytes(address.to_bytes()), address);
    }

    #[test]
    fn device_id_keeps_low_24_bits() {
        let id = DeviceId::from(0xFF12_3456);
        assert_eq!(id, DeviceId([0x12, 0x34, 0x56]));
        assert_eq!(id.as_u32(), 0x12_3456);
    }
}
