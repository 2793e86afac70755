use super::{error::DecodeResult, *};
use crate::{DeviceId, DeviceIdentity, UnitCode};

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Master to slave request, as produced by the frame packers.
    Request(Request),
    /// Slave to master reply, solicited or burst.
    Response(Response),
}

impl Message {
    pub fn address(&self) -> Address {
        match self {
            Message::Request(r) => r.address,
            Message::Response(r) => r.address,
        }
    }

    pub fn command(&self) -> u8 {
        match self {
            Message::Request(r) => r.command,
            Message::Response(r) => r.command,
        }
    }

    /// Device identity carried by a command 0 reply.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        match self {
            Message::Response(Response {
                body: ResponseBody::UniqueIdentifier(id),
                ..
            }) => Some(id.identity),
            _ => None,
        }
    }

    /// Variables carried by a command 3 reply.
    pub fn dynamic_variables(&self) -> Option<&DynamicVariables> {
        match self {
            Message::Response(Response {
                body: ResponseBody::DynamicVariables(vars),
                ..
            }) => Some(vars),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub address: Address,
    pub command: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub address: Address,
    pub command: u8,
    /// Sent unsolicited in burst mode.
    pub burst: bool,
    /// First status byte. Bit 7 set means a communication error summary.
    pub response_code: u8,
    /// Second status byte (field device status flags).
    pub device_status: u8,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Command 0.
    UniqueIdentifier(UniqueIdentifier),
    /// Command 1.
    PrimaryVariable(PrimaryVariable),
    /// Command 3.
    DynamicVariables(DynamicVariables),
    /// Any other command, or a reply carrying only the status bytes.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueIdentifier {
    pub identity: DeviceIdentity,
    /// Minimum preambles the device expects from the master.
    pub request_preambles: u8,
    pub universal_revision: u8,
    pub device_revision: u8,
    pub software_revision: u8,
    /// Upper five bits of the hardware revision byte.
    pub hardware_revision: u8,
    /// Lower three bits of the hardware revision byte.
    pub physical_signaling: u8,
    pub flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimaryVariable {
    pub units: UnitCode,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Variable {
    pub units: UnitCode,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicVariables {
    /// Loop current in milliamperes.
    pub loop_current: f32,
    pub primary: Variable,
    pub secondary: Option<Variable>,
    pub tertiary: Option<Variable>,
    pub quaternary: Option<Variable>,
}

const UNIQUE_IDENTIFIER_SIZE: usize = 12;
const EXPANSION_CODE: u8 = 254;
const VARIABLE_SIZE: usize = 5;

pub(crate) fn decode_response_body(command: u8, data: &[u8]) -> DecodeResult<ResponseBody> {
    // error replies carry no command data
    if data.is_empty() {
        return Ok(ResponseBody::Raw(Vec::new()));
    }

    match command {
        CMD_READ_UNIQUE_IDENTIFIER => decode_unique_identifier(data).map(ResponseBody::UniqueIdentifier),
        CMD_READ_PRIMARY_VARIABLE => decode_primary_variable(data).map(ResponseBody::PrimaryVariable),
        CMD_READ_DYNAMIC_VARIABLES => decode_dynamic_variables(data).map(ResponseBody::DynamicVariables),
        _ => Ok(ResponseBody::Raw(data.to_vec())),
    }
}

/// Trailing bytes added by HART 6/7 are ignored.
fn decode_unique_identifier(data: &[u8]) -> DecodeResult<UniqueIdentifier> {
    if data.len() < UNIQUE_IDENTIFIER_SIZE {
        return Err(DecodeError::MalformedBody {
            command: CMD_READ_UNIQUE_IDENTIFIER,
            reason: "shorter than 12 bytes",
        });
    }

    if data[0] != EXPANSION_CODE {
        return Err(DecodeError::MalformedBody {
            command: CMD_READ_UNIQUE_IDENTIFIER,
            reason: "missing 254 expansion code",
        });
    }

    Ok(UniqueIdentifier {
        identity: DeviceIdentity {
            manufacturer_id: data[1],
            device_type: data[2],
            device_id: DeviceId([data[9], data[10], data[11]]),
        },
        request_preambles: data[3],
        universal_revision: data[4],
        device_revision: data[5],
        software_revision: data[6],
        hardware_revision: data[7] >> 3,
        physical_signaling: data[7] & 0x07,
        flags: data[8],
    })
}

fn decode_primary_variable(data: &[u8]) -> DecodeResult<PrimaryVariable> {
    let variable = read_variable(data).ok_or(DecodeError::MalformedBody {
        command: CMD_READ_PRIMARY_VARIABLE,
        reason: "shorter than 5 bytes",
    })?;

    Ok(PrimaryVariable {
        units: variable.units,
        value: variable.value,
    })
}

fn decode_dynamic_variables(data: &[u8]) -> DecodeResult<DynamicVariables> {
    let malformed = DecodeError::MalformedBody {
        command: CMD_READ_DYNAMIC_VARIABLES,
        reason: "missing loop current or primary variable",
    };

    let loop_current = read_f32(data).ok_or(malformed.clone())?;
    let mut variables = data[4..]
        .chunks_exact(VARIABLE_SIZE)
        .filter_map(read_variable);

    let primary = variables.next().ok_or(malformed)?;

    Ok(DynamicVariables {
        loop_current,
        primary,
        secondary: variables.next(),
        tertiary: variables.next(),
        quaternary: variables.next(),
    })
}

fn read_variable(bytes: &[u8]) -> Option<Variable> {
    let (&units, rest) = bytes.split_first()?;
    Some(Variable {
        units: UnitCode(units),
        value: read_f32(rest)?,
    })
}

fn read_f32(bytes: &[u8]) -> Option<f32> {
    let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    Some(f32::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable_bytes(units: u8, value: f32) -> Vec<u8> {
        let mut out = vec![units];
        out.extend_from_slice(&value.to_be_bytes());
        out
    }

    #[test]
    fn unique_identifier_fields() {
        let data = [254, 1, 2, 5, 7, 1, 3, 0b0000_1001, 0, 0, 0, 3, 5, 4];

        let body = decode_response_body(0, &data).unwrap();

        let ResponseBody::UniqueIdentifier(id) = body else {
            panic!("expected unique identifier, got {body:?}");
        };
        assert_eq!(id.identity.manufacturer_id, 1);
        assert_eq!(id.identity.device_type, 2);
        assert_eq!(id.identity.device_id, DeviceId([0, 0, 3]));
        assert_eq!(id.request_preambles, 5);
        assert_eq!(id.hardware_revision, 1);
        assert_eq!(id.physical_signaling, 1);
    }

    #[test]
    fn unique_identifier_requires_expansion_code() {
        let data = [0u8; 12];
        assert!(matches!(
            decode_response_body(0, &data),
            Err(DecodeError::MalformedBody { command: 0, .. })
        ));
    }

    #[test]
    fn dynamic_variables_with_two_variables() {
        let mut data = 12.5f32.to_be_bytes().to_vec();
        data.extend(variable_bytes(7, 1.5));
        data.extend(variable_bytes(32, 0.002));

        let body = decode_response_body(3, &data).unwrap();

        let ResponseBody::DynamicVariables(vars) = body else {
            panic!("expected dynamic variables, got {body:?}");
        };
        assert_eq!(vars.loop_current, 12.5);
        assert_eq!(vars.primary.value, 1.5);
        assert_eq!(vars.primary.units, UnitCode(7));
        assert_eq!(vars.secondary.map(|v| v.value), Some(0.002));
        assert_eq!(vars.tertiary, None);
    }

    #[test]
    fn dynamic_variables_need_primary() {
        let data = 4.0f32.to_be_bytes();
        assert!(decode_response_body(3, &data).is_err());
    }

    #[test]
    fn status_only_reply_is_raw() {
        assert_eq!(decode_response_body(3, &[]), Ok(ResponseBody::Raw(vec![])));
    }

    #[test]
    fn primary_variable() {
        let data = variable_bytes(12, 101.325);
        assert_eq!(
            decode_response_body(1, &data),
            Ok(ResponseBody::PrimaryVariable(PrimaryVariable {
                units: UnitCode(12),
                value: 101.325,
            }))
        );
    }
}
