// Chunk message composer
//
// Reassembles the interleaved chunk streams of one RTMP connection back
// into complete messages. Counterpart of the sending side's chunking: every
// byte received after the handshake must flow through the same composer,
// since chunk headers compress against state left by earlier chunks.

use std::collections::HashMap;
use std::{cmp, io};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{
    get_chunk_message_header_size, ChunkStream, RTMP_CHUNK_FORMAT_0, RTMP_CHUNK_FORMAT_1,
    RTMP_CHUNK_FORMAT_2, RTMP_DEFAULT_CHUNK_SIZE, RTMP_MAX_TIMESTAMP_IN_HEADER,
    RTMP_TYPE_SET_CHUNK_SIZE,
};

/// Error assembling chunks into messages
#[derive(Debug, Error)]
pub enum ChunkComposeError {
    /// The reader failed
    #[error("{0}")]
    Io(#[from] io::Error),

    /// A message buffer grew past its declared length. The connection is in
    /// an unrecoverable state and must be dropped
    #[error("message buffer holds {got} bytes, past the declared length of {expected}")]
    MessageOverrun { got: usize, expected: usize },

    /// A Set-Chunk-Size message did not carry the 4 byte payload
    #[error("set chunk size message carried only {got} payload bytes")]
    SetChunkSizeTooShort { got: usize },

    /// The complete-message callback rejected a message
    #[error("{0}")]
    Callback(String),
}

/// Chunk message composer
///
/// Holds the chunk size negotiated by the peer and one ChunkStream per CSID
/// seen on the wire. The CSID map grows lazily.
pub struct ChunkComposer {
    /// Chunk size the peer is sending with. Updated in-band by
    /// Set-Chunk-Size messages
    peer_chunk_size: u32,

    /// Per-CSID assembly state
    csid_to_stream: HashMap<u32, ChunkStream>,
}

impl ChunkComposer {
    /// Creates new ChunkComposer with the protocol default chunk size
    pub fn new() -> ChunkComposer {
        ChunkComposer {
            peer_chunk_size: RTMP_DEFAULT_CHUNK_SIZE,
            csid_to_stream: HashMap::new(),
        }
    }

    /// Gets the current peer chunk size
    pub fn peer_chunk_size(&self) -> u32 {
        self.peer_chunk_size
    }

    /// Consumes the reader indefinitely, invoking cb for every completed message
    ///
    /// # Arguments
    ///
    /// * `read_stream` - IO stream to read bytes
    /// * `cb` - Invoked with the chunk stream each time a message is complete
    ///
    /// # Return value
    ///
    /// Never returns success. Returns the first reader error or the first
    /// error returned by cb
    pub async fn run_loop<TR, F>(
        &mut self,
        read_stream: &mut TR,
        mut cb: F,
    ) -> Result<(), ChunkComposeError>
    where
        TR: AsyncRead + AsyncReadExt + Send + Unpin,
        F: FnMut(&ChunkStream) -> Result<(), ChunkComposeError>,
    {
        let mut header = [0_u8; 11];

        loop {
            // Basic header (5.3.1.1)

            let b0 = read_stream.read_u8().await?;

            let format = (b0 >> 6) & 0x03;
            let mut csid = (b0 & 0x3F) as u32;

            match csid {
                0 => {
                    let ext = read_stream.read_u8().await?;
                    csid = 64 + ext as u32;
                }
                1 => {
                    read_stream.read_exact(&mut header[..2]).await?;
                    csid = 64 + header[0] as u32 + header[1] as u32 * 256;
                }
                _ => {}
            }

            let stream = self.csid_to_stream.entry(csid).or_default();

            // Chunk message header (5.3.1.2)

            let header_size = get_chunk_message_header_size(format);
            if header_size > 0 {
                read_stream.read_exact(&mut header[..header_size]).await?;
            }

            match format {
                RTMP_CHUNK_FORMAT_0 => {
                    stream.header.timestamp = BigEndian::read_u24(&header[..3]);
                    stream.timestamp_abs = stream.header.timestamp;
                    stream.msg_len = BigEndian::read_u24(&header[3..6]) as usize;
                    stream.header.msg_type_id = header[6];
                    stream.header.msg_stream_id = LittleEndian::read_u32(&header[7..11]);

                    stream.reserve_msg();
                }
                RTMP_CHUNK_FORMAT_1 => {
                    stream.header.timestamp = BigEndian::read_u24(&header[..3]);
                    stream.timestamp_abs =
                        stream.timestamp_abs.wrapping_add(stream.header.timestamp);
                    stream.msg_len = BigEndian::read_u24(&header[3..6]) as usize;
                    stream.header.msg_type_id = header[6];

                    stream.reserve_msg();
                }
                RTMP_CHUNK_FORMAT_2 => {
                    stream.header.timestamp = BigEndian::read_u24(&header[..3]);
                    stream.timestamp_abs =
                        stream.timestamp_abs.wrapping_add(stream.header.timestamp);
                }
                _ => {}
            }

            // Extended timestamp (5.3.1.3)

            if stream.header.timestamp == RTMP_MAX_TIMESTAMP_IN_HEADER {
                read_stream.read_exact(&mut header[..4]).await?;

                stream.header.timestamp = BigEndian::read_u32(&header[..4]);

                match format {
                    RTMP_CHUNK_FORMAT_0 => {
                        stream.timestamp_abs = stream.header.timestamp;
                    }
                    RTMP_CHUNK_FORMAT_1 | RTMP_CHUNK_FORMAT_2 => {
                        stream.timestamp_abs = stream
                            .timestamp_abs
                            .wrapping_sub(RTMP_MAX_TIMESTAMP_IN_HEADER)
                            .wrapping_add(stream.header.timestamp);
                    }
                    _ => {}
                }
            }

            // Payload slice of this chunk

            let needed_size = if stream.msg_len <= self.peer_chunk_size as usize {
                stream.msg_len
            } else {
                cmp::min(
                    self.peer_chunk_size as usize,
                    stream.msg_len - stream.msg.len(),
                )
            };

            if needed_size > 0 {
                let filled = stream.msg.len();
                stream.msg.resize(filled + needed_size, 0);
                read_stream.read_exact(&mut stream.msg[filled..]).await?;
            }

            // Deliver

            if stream.msg.len() == stream.msg_len {
                if stream.header.msg_type_id == RTMP_TYPE_SET_CHUNK_SIZE {
                    if stream.msg.len() < 4 {
                        return Err(ChunkComposeError::SetChunkSizeTooShort {
                            got: stream.msg.len(),
                        });
                    }
                    self.peer_chunk_size = BigEndian::read_u32(&stream.msg[..4]);
                }

                cb(stream)?;

                stream.clear_msg();
            } else if stream.msg.len() > stream.msg_len {
                return Err(ChunkComposeError::MessageOverrun {
                    got: stream.msg.len(),
                    expected: stream.msg_len,
                });
            }
        }
    }
}

impl Default for ChunkComposer {
    fn default() -> ChunkComposer {
        ChunkComposer::new()
    }
}
