// FLV tag model

use byteorder::{BigEndian, ByteOrder};

// Tag types
pub const TAG_TYPE_AUDIO: u8 = 8;
pub const TAG_TYPE_VIDEO: u8 = 9;
pub const TAG_TYPE_METADATA: u8 = 18;

/// Size of a tag header on the wire
pub const TAG_HEADER_SIZE: usize = 11;

/// Size of the PreviousTagSize field trailing every tag
pub const PREV_TAG_SIZE_FIELD_SIZE: usize = 4;

/// Header of an FLV tag
#[derive(Clone)]
pub struct TagHeader {
    /// Tag type (audio, video or metadata)
    pub tag_type: u8,

    /// Payload size, excluding the header itself
    pub data_size: u32,

    /// Timestamp in milliseconds, with the extension byte folded in
    pub timestamp: u32,

    /// Stream ID (always 0 on the wire)
    pub stream_id: u32,
}

/// One FLV tag: parsed header plus the raw bytes of header and payload
pub struct FlvTag {
    /// Parsed tag header
    pub header: TagHeader,

    /// Raw tag bytes as written to subscribers
    pub raw: Vec<u8>,
}

impl FlvTag {
    /// Wraps raw tag bytes, parsing the leading header
    pub fn from_raw(raw: Vec<u8>) -> Option<FlvTag> {
        let header = parse_tag_header(&raw)?;
        Some(FlvTag { header, raw })
    }
}

/// Parses a tag header from the first TAG_HEADER_SIZE bytes of b
pub fn parse_tag_header(b: &[u8]) -> Option<TagHeader> {
    if b.len() < TAG_HEADER_SIZE {
        return None;
    }

    Some(TagHeader {
        tag_type: b[0],
        data_size: BigEndian::read_u24(&b[1..4]),
        // The 4th timestamp byte extends the 24 bit field upwards
        timestamp: ((b[7] as u32) << 24) | BigEndian::read_u24(&b[4..7]),
        stream_id: BigEndian::read_u24(&b[8..11]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_header() {
        let raw = vec![
            TAG_TYPE_AUDIO,
            0x00, 0x00, 0x03, // data size
            0x00, 0x03, 0xE8, // timestamp
            0x00, // timestamp extension
            0x00, 0x00, 0x00, // stream id
            0xAA, 0xBB, 0xCC,
        ];

        let tag = FlvTag::from_raw(raw).unwrap();

        assert_eq!(tag.header.tag_type, TAG_TYPE_AUDIO);
        assert_eq!(tag.header.data_size, 3);
        assert_eq!(tag.header.timestamp, 1000);
        assert_eq!(tag.header.stream_id, 0);
        assert_eq!(tag.raw.len(), TAG_HEADER_SIZE + 3);
    }

    #[test]
    fn test_parse_tag_header_folds_extension_byte() {
        let mut b = vec![0_u8; TAG_HEADER_SIZE];
        b[0] = TAG_TYPE_VIDEO;
        b[4] = 0xFF;
        b[5] = 0xFF;
        b[6] = 0xFF;
        b[7] = 0x01;

        let header = parse_tag_header(&b).unwrap();

        assert_eq!(header.timestamp, 0x01FFFFFF);
    }

    #[test]
    fn test_parse_tag_header_rejects_short_input() {
        assert!(parse_tag_header(&[0_u8; TAG_HEADER_SIZE - 1]).is_none());
    }
}
