//! Driver-boundary state packet: current phase plus completion flags.

use crate::error::Result;
use crate::packet::{combine_u32_to_u64, has_u32, Packetable};
use crate::serializers::{deserialize_u16, deserialize_u64, serialize_u16, serialize_u64};

/// Packet type tag of [`StatePacket`].
pub const STATE_PACKET_TYPE: u32 = 10;

/// Flags carried in the halves of a message value.
pub mod value {
    pub const UNKNOWN: u32 = 0;
    pub const REJECTED: u32 = 1;
    pub const ACKNOWLEDGED: u32 = 2;
    pub const ACTIVE_DATA_STREAM: u32 = 3;
    pub const COMPLETED_DATA_STREAM: u32 = 4;
}

/// Message codes identifying protocol phases.
pub mod code {
    pub const START_FLOW: u16 = 100;
    pub const ACTION_RESPONSE: u16 = 101;
    pub const TERMINATE: u16 = 102;
    pub const NOTIFY_CURRENT_OBJECT_STATES: u16 = 111;
    pub const REQUEST_CURRENT_OBJECTS_STATE: u16 = 112;
    pub const RESPOND_CURRENT_STATE: u16 = 113;
    pub const NEGOTIATION_REQUEST: u16 = 141;
    pub const RESPOND_NEGOTIATION_REQUEST: u16 = 142;
    pub const EXCHANGE_DATA_STREAM: u16 = 170;
    pub const COMMIT: u16 = 200;
}

/// Build a message value from an acknowledgement and a stream flag.
pub fn message_value(ack: u32, stream: u32) -> u64 {
    combine_u32_to_u64(ack, stream)
}

/// The phase and completion flags a driver passes into each handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatePacket {
    pub message_code: u16,
    pub message_value: u64,
    pub error_code: u16,
}

impl StatePacket {
    pub fn new(message_code: u16, message_value: u64) -> Self {
        Self {
            message_code,
            message_value,
            error_code: 0,
        }
    }

    pub fn has_ack(&self) -> bool {
        has_u32(self.message_value, value::ACKNOWLEDGED)
    }

    pub fn has_active_data_stream(&self) -> bool {
        has_u32(self.message_value, value::ACTIVE_DATA_STREAM)
    }

    pub fn has_completed_data_stream(&self) -> bool {
        has_u32(self.message_value, value::COMPLETED_DATA_STREAM)
    }

    pub fn has_error(&self) -> bool {
        self.error_code != 0
    }
}

impl Packetable for StatePacket {
    fn packet_type(&self) -> u64 {
        combine_u32_to_u64(STATE_PACKET_TYPE, 0)
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(16);
        serialize_u16(&mut data, self.message_code);
        serialize_u64(&mut data, self.message_value);
        serialize_u16(&mut data, self.error_code);
        Ok(data)
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let (message_code, rest) = deserialize_u16(data)?;
        let (message_value, rest) = deserialize_u64(rest)?;
        let (error_code, _) = deserialize_u16(rest)?;
        Ok(Self {
            message_code,
            message_value,
            error_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let active = StatePacket::new(
            code::EXCHANGE_DATA_STREAM,
            message_value(value::ACKNOWLEDGED, value::ACTIVE_DATA_STREAM),
        );
        assert!(active.has_ack());
        assert!(active.has_active_data_stream());
        assert!(!active.has_completed_data_stream());
        assert!(!active.has_error());

        let done = StatePacket::new(
            code::EXCHANGE_DATA_STREAM,
            message_value(value::ACKNOWLEDGED, value::COMPLETED_DATA_STREAM),
        );
        assert!(done.has_completed_data_stream());
        assert!(!done.has_active_data_stream());
    }

    #[test]
    fn test_serialization() {
        let state = StatePacket {
            message_code: code::COMMIT,
            message_value: message_value(value::ACKNOWLEDGED, value::UNKNOWN),
            error_code: 7,
        };
        let bytes = state.serialize().unwrap();
        assert_eq!(StatePacket::deserialize(&bytes).unwrap(), state);
        assert!(state.has_error());
    }
}
