// Chunk stream model

/// Header of the message currently assembled on a chunk stream
#[derive(Clone)]
pub struct MessageHeader {
    /// Timestamp (or timestamp delta) from the last format 0/1/2 chunk header
    pub timestamp: u32,

    /// Message type ID
    pub msg_type_id: u8,

    /// Message stream ID
    pub msg_stream_id: u32,
}

/// State of one chunk stream (one CSID) inside a connection
///
/// The composer multiplexes every message of a CSID through the same
/// ChunkStream, so format 1/2/3 chunks inherit whatever the last full
/// header left here.
pub struct ChunkStream {
    /// Message header
    pub header: MessageHeader,

    /// Absolute timestamp of the message being assembled
    pub timestamp_abs: u32,

    /// Declared length of the message being assembled
    pub msg_len: usize,

    /// Message buffer. Grows to msg_len, never beyond
    pub msg: Vec<u8>,
}

impl ChunkStream {
    /// Creates new blank ChunkStream
    pub fn new() -> ChunkStream {
        ChunkStream {
            header: MessageHeader {
                timestamp: 0,
                msg_type_id: 0,
                msg_stream_id: 0,
            },
            timestamp_abs: 0,
            msg_len: 0,
            msg: Vec::new(),
        }
    }

    /// Makes sure the message buffer can hold msg_len bytes without reallocating
    pub fn reserve_msg(&mut self) {
        let len = self.msg.len();
        if self.msg_len > len {
            self.msg.reserve(self.msg_len - len);
        }
    }

    /// Clears the message buffer after delivery, keeping its capacity for reuse
    pub fn clear_msg(&mut self) {
        self.msg.clear();
    }
}

impl Default for ChunkStream {
    fn default() -> ChunkStream {
        ChunkStream::new()
    }
}
