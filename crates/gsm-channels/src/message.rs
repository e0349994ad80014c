//! Radio resource message lookup over decoded frames

use crate::frame::Frame;

/// Protocol discriminator of radio resource management messages
pub const RR_PROTOCOL_DISCRIMINATOR: u8 = 0x06;

/// A layer 3 message identified by its header octets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RrMessage {
    pub protocol_discriminator: u8,
    pub message_type: u8,
}

impl RrMessage {
    pub const IMMEDIATE_ASSIGNMENT: RrMessage = RrMessage::rr(0x3f);
    pub const CIPHERING_MODE_COMMAND: RrMessage = RrMessage::rr(0x35);
    pub const SYSTEM_INFORMATION_5: RrMessage = RrMessage::rr(0x1d);
    pub const SYSTEM_INFORMATION_6: RrMessage = RrMessage::rr(0x1e);

    /// Radio resource message with the given message type
    pub const fn rr(message_type: u8) -> Self {
        Self {
            protocol_discriminator: RR_PROTOCOL_DISCRIMINATOR,
            message_type,
        }
    }

    /// Whether `frame` carries this message
    pub fn matches(&self, frame: &Frame) -> bool {
        frame.rr_header() == Some((self.protocol_discriminator, self.message_type))
    }
}
