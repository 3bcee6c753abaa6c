// RTMP constants

// Chunk formats
pub const RTMP_CHUNK_FORMAT_0: u8 = 0; // 11-bytes: timestamp(3) + length(3) + message type(1) + stream id(4)
pub const RTMP_CHUNK_FORMAT_1: u8 = 1; // 7-bytes: delta(3) + length(3) + message type(1)
pub const RTMP_CHUNK_FORMAT_2: u8 = 2; // 3-bytes: delta(3)
pub const RTMP_CHUNK_FORMAT_3: u8 = 3; // 0-byte

/// Gets the chunk message header size for a chunk format
pub fn get_chunk_message_header_size(format: u8) -> usize {
    match format {
        0 => 11,
        1 => 7,
        2 => 3,
        _ => 0,
    }
}

// Chunk size every peer starts with, before any Set-Chunk-Size renegotiation
pub const RTMP_DEFAULT_CHUNK_SIZE: u32 = 128;

// Timestamp sentinel indicating an extended (32 bit) timestamp follows the header
pub const RTMP_MAX_TIMESTAMP_IN_HEADER: u32 = 0xFFFFFF;

// Message types

/* Protocol Control Messages */
pub const RTMP_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const RTMP_TYPE_ABORT: u8 = 2;
pub const RTMP_TYPE_ACKNOWLEDGEMENT: u8 = 3; // bytes read report
pub const RTMP_TYPE_WINDOW_ACKNOWLEDGEMENT_SIZE: u8 = 5; // server bandwidth
pub const RTMP_TYPE_SET_PEER_BANDWIDTH: u8 = 6; // client bandwidth

/* User Control Messages Event (4) */
pub const RTMP_TYPE_EVENT: u8 = 4;

pub const RTMP_TYPE_AUDIO: u8 = 8;
pub const RTMP_TYPE_VIDEO: u8 = 9;

/* Data Message */
pub const RTMP_TYPE_FLEX_STREAM: u8 = 15; // AMF3
pub const RTMP_TYPE_DATA: u8 = 18; // AMF0

/* Command Message */
pub const RTMP_TYPE_FLEX_MESSAGE: u8 = 17; // AMF3
pub const RTMP_TYPE_INVOKE: u8 = 20; // AMF0
