//! Decoded frame records

use std::collections::BTreeMap;

/// Decoded frames of one channel, keyed by GSM frame number
pub type FrameMap = BTreeMap<u32, Frame>;

/// One decoded time slot as reported by the external decoder
///
/// Frames are immutable once built. The meaning of `block_index` depends on
/// the channel type (sub-channel or block position within the multiframe).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    frame_number: u32,
    block_index: u32,
    tokens: Vec<String>,
}

impl Frame {
    /// Create a frame from its parsed fields
    pub fn new(frame_number: u32, block_index: u32, tokens: Vec<String>) -> Self {
        Self {
            frame_number,
            block_index,
            tokens,
        }
    }

    /// GSM frame counter
    pub fn frame_number(&self) -> u32 {
        self.frame_number
    }

    /// Secondary index reported next to the frame number
    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    /// Byte tokens in emission order, as printed by the decoder
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Decode the tokens as hex bytes
    ///
    /// Returns `None` if any token is not a two-digit hex pair.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.tokens.iter().map(|t| parse_hex_byte(t)).collect()
    }

    /// Protocol discriminator and message type of the layer 3 header
    ///
    /// The decoder prints the LAPDm address octet first, so the header sits
    /// in tokens 1 and 2.
    pub fn rr_header(&self) -> Option<(u8, u8)> {
        let pd = parse_hex_byte(self.tokens.get(1)?)?;
        let mt = parse_hex_byte(self.tokens.get(2)?)?;
        Some((pd, mt))
    }
}

fn parse_hex_byte(token: &str) -> Option<u8> {
    if token.len() != 2 {
        return None;
    }
    u8::from_str_radix(token, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tokens: &[&str]) -> Frame {
        Frame::new(12, 3, tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_accessors() {
        let f = frame(&["1a", "2b"]);
        assert_eq!(f.frame_number(), 12);
        assert_eq!(f.block_index(), 3);
        assert_eq!(f.tokens(), &["1a".to_string(), "2b".to_string()]);
    }

    #[test]
    fn test_bytes() {
        assert_eq!(frame(&["01", "ff", "2B"]).bytes(), Some(vec![0x01, 0xff, 0x2b]));
        assert_eq!(frame(&["01", "zz"]).bytes(), None);
        assert_eq!(frame(&["1"]).bytes(), None);
    }

    #[test]
    fn test_rr_header() {
        assert_eq!(frame(&["01", "06", "3f", "00"]).rr_header(), Some((0x06, 0x3f)));
        assert_eq!(frame(&["01", "06"]).rr_header(), None);
        assert_eq!(frame(&["01", "xx", "3f"]).rr_header(), None);
    }
}
