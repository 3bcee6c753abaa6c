// RTP packet model

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Size of the RTP fixed header (rfc3550 5.1)
pub const RTP_FIXED_HEADER_SIZE: usize = 12;

/// Error parsing an RTP packet
#[derive(Debug, Error)]
pub enum RtpPacketError {
    /// The packet is shorter than its own header declares
    #[error("rtp packet of {got} bytes is shorter than its header requires ({required})")]
    TooShort { got: usize, required: usize },
}

/// Fields of the RTP fixed header
#[derive(Clone)]
pub struct RtpHeader {
    /// Protocol version (2)
    pub version: u8,

    /// Padding flag
    pub padding: bool,

    /// Header extension flag
    pub extension: bool,

    /// Number of CSRC entries following the fixed header
    pub csrc_count: u8,

    /// Marker bit
    pub mark: bool,

    /// Payload type
    pub payload_type: u8,

    /// Sequence number
    pub seq: u16,

    /// Timestamp, in clock-rate units
    pub timestamp: u32,

    /// Synchronization source
    pub ssrc: u32,

    /// Byte index at which the payload begins inside the raw packet
    pub payload_offset: usize,
}

/// One RTP packet: raw bytes plus the parsed fixed header
pub struct RtpPacket {
    /// Parsed fixed header
    pub header: RtpHeader,

    /// Full packet bytes
    pub raw: Vec<u8>,
}

impl RtpPacket {
    /// Gets the packet payload
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.header.payload_offset.min(self.raw.len())..]
    }
}

/// Parses the fixed header of an RTP packet, taking ownership of the bytes
///
/// The payload offset accounts for the CSRC list and, when the extension
/// bit is set, the header extension block.
pub fn parse_rtp_packet(raw: Vec<u8>) -> Result<RtpPacket, RtpPacketError> {
    if raw.len() < RTP_FIXED_HEADER_SIZE {
        return Err(RtpPacketError::TooShort {
            got: raw.len(),
            required: RTP_FIXED_HEADER_SIZE,
        });
    }

    let version = raw[0] >> 6;
    let padding = (raw[0] >> 5) & 0x01 == 1;
    let extension = (raw[0] >> 4) & 0x01 == 1;
    let csrc_count = raw[0] & 0x0F;
    let mark = raw[1] >> 7 == 1;
    let payload_type = raw[1] & 0x7F;
    let seq = BigEndian::read_u16(&raw[2..4]);
    let timestamp = BigEndian::read_u32(&raw[4..8]);
    let ssrc = BigEndian::read_u32(&raw[8..12]);

    let mut payload_offset = RTP_FIXED_HEADER_SIZE + csrc_count as usize * 4;

    if extension {
        if raw.len() < payload_offset + 4 {
            return Err(RtpPacketError::TooShort {
                got: raw.len(),
                required: payload_offset + 4,
            });
        }
        let extension_words = BigEndian::read_u16(&raw[payload_offset + 2..payload_offset + 4]);
        payload_offset += 4 + extension_words as usize * 4;
    }

    if raw.len() < payload_offset {
        return Err(RtpPacketError::TooShort {
            got: raw.len(),
            required: payload_offset,
        });
    }

    Ok(RtpPacket {
        header: RtpHeader {
            version,
            padding,
            extension,
            csrc_count,
            mark,
            payload_type,
            seq,
            timestamp,
            ssrc,
            payload_offset,
        },
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_header(seq: u16, timestamp: u32) -> Vec<u8> {
        let mut raw = vec![0_u8; RTP_FIXED_HEADER_SIZE];
        raw[0] = 0x80;
        raw[1] = 0x80 | 97;
        BigEndian::write_u16(&mut raw[2..4], seq);
        BigEndian::write_u32(&mut raw[4..8], timestamp);
        BigEndian::write_u32(&mut raw[8..12], 0x11223344);
        raw
    }

    #[test]
    fn test_parse_fixed_header() {
        let mut raw = fixed_header(4660, 96000);
        raw.extend_from_slice(&[1, 2, 3, 4]);

        let pkt = parse_rtp_packet(raw).unwrap();

        assert_eq!(pkt.header.version, 2);
        assert!(pkt.header.mark);
        assert_eq!(pkt.header.payload_type, 97);
        assert_eq!(pkt.header.seq, 4660);
        assert_eq!(pkt.header.timestamp, 96000);
        assert_eq!(pkt.header.ssrc, 0x11223344);
        assert_eq!(pkt.header.payload_offset, 12);
        assert_eq!(pkt.payload(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_skips_extension_block() {
        let mut raw = fixed_header(1, 0);
        raw[0] |= 0x10; // extension bit
        raw.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01]); // profile + 1 word
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw.extend_from_slice(&[9, 9]);

        let pkt = parse_rtp_packet(raw).unwrap();

        assert_eq!(pkt.header.payload_offset, 20);
        assert_eq!(pkt.payload(), &[9, 9]);
    }

    #[test]
    fn test_parse_rejects_truncated_packet() {
        let res = parse_rtp_packet(vec![0x80, 97, 0, 1]);
        assert!(matches!(res, Err(RtpPacketError::TooShort { .. })));
    }
}
