// RTP AAC depacketization (rfc3640, AAC-hbr)
//
// rfc3640 2.11, global structure of the payload format:
//
// +---------+-----------+-----------+---------------+
// | RTP     | AU Header | Auxiliary | Access Unit   |
// | Header  | Section   | Section   | Data Section  |
// +---------+-----------+-----------+---------------+
//
//           <----------RTP Packet Payload----------->
//
// A packet carries either one or more complete access units, or a single
// fragment of one access unit. Fragments share the timestamp of the access
// unit and run on consecutive sequence numbers.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};

use crate::log::Logger;

use super::{sub_seq, AvPacket, AvPayloadType, OnAvPacket, RtpPacketList};

// Samples per AAC-LC access unit
const AAC_SAMPLES_PER_FRAME: u32 = 1024;

/// One entry of an AU header section
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AuHeader {
    /// Access unit length in bytes
    pub size: u32,

    /// Byte offset of the access unit inside the RTP payload
    pub pos: u32,
}

/// Parses the AU header section of an AAC RTP payload (rfc3640 3.2.1)
///
/// The section starts with a 16 bit AU-headers-length field counted in bits,
/// followed by one 2 byte header per access unit: 13 bit AU-size plus 3 bit
/// AU-index. The index is unreliable under fragmentation and is discarded.
///
/// Never fails: structural problems are logged as warnings, and descriptors
/// may point outside the buffer, which the unpacker rejects.
pub fn parse_au_headers(b: &[u8], logger: &Logger) -> Vec<AuHeader> {
    if b.len() < 2 {
        logger.log_warning(&format!(
            "rtp payload too short for an au header section. len={}",
            b.len()
        ));
        return Vec::new();
    }

    let au_headers_length_bits = BigEndian::read_u16(&b[..2]) as u32;
    let au_headers_length = (au_headers_length_bits + 7) / 8;

    // TODO: take the 13+3 bit field split from the SDP fmtp line instead
    // of fixing it to the AAC-hbr mode sizes
    const AU_HEADER_SIZE: u32 = 2;
    let nb_au_headers = au_headers_length / AU_HEADER_SIZE;

    let mut ret: Vec<AuHeader> = Vec::with_capacity(nb_au_headers as usize);

    let mut pauh = 2_u32;
    let mut pau = 2 + au_headers_length;

    for _ in 0..nb_au_headers {
        let (hi, lo) = match (b.get(pauh as usize), b.get(pauh as usize + 1)) {
            (Some(hi), Some(lo)) => (*hi, *lo),
            _ => {
                logger.log_warning(&format!(
                    "au header section truncated. declared={} bits, len={}",
                    au_headers_length_bits,
                    b.len()
                ));
                break;
            }
        };

        let au_size = ((hi as u32) << 5) | (((lo & 0xF8) as u32) >> 3);

        ret.push(AuHeader { size: au_size, pos: pau });

        pauh += 2;
        pau += au_size;
    }

    if (nb_au_headers > 1 && pau != b.len() as u32) || (nb_au_headers == 1 && pau < b.len() as u32)
    {
        logger.log_warning(&format!(
            "rtp packet size inconsistent with its au headers. nb_au_headers={}, pau={}, len={}",
            nb_au_headers,
            pau,
            b.len()
        ));
    }

    ret
}

/// RTP unpacker for AAC
///
/// Consumes packets from the front of an ordered RtpPacketList and emits
/// complete access units through the callback, reassembling access units
/// fragmented across several packets.
pub struct RtpUnpackerAac {
    payload_type: AvPayloadType,
    clock_rate: u32,
    logger: Arc<Logger>,
    on_av_packet: OnAvPacket,
}

impl RtpUnpackerAac {
    /// Creates new RtpUnpackerAac
    ///
    /// # Arguments
    ///
    /// * `payload_type` - Payload type stamped on emitted AV packets
    /// * `clock_rate` - RTP clock rate of the stream, for example 48000
    /// * `logger` - Logger
    /// * `on_av_packet` - Callback receiving every depacketized access unit
    pub fn new(
        payload_type: AvPayloadType,
        clock_rate: u32,
        logger: Arc<Logger>,
        on_av_packet: OnAvPacket,
    ) -> RtpUnpackerAac {
        RtpUnpackerAac {
            payload_type,
            clock_rate,
            logger,
            on_av_packet,
        }
    }

    /// Tries to produce AV packets from the head of the list
    ///
    /// Returns the sequence number of the last consumed packet when one or
    /// more packets were consumed. Returns None, with the list untouched and
    /// no callback fired, when the head run is incomplete or invalid, so a
    /// None call can be retried after more packets arrive.
    pub fn try_unpack_one(&mut self, list: &mut RtpPacketList) -> Option<u16> {
        let (first_seq, first_timestamp, b) = {
            let first = list.front()?;
            (
                first.header.seq,
                first.header.timestamp,
                first.payload().to_vec(),
            )
        };

        let aus = parse_au_headers(&b, &self.logger);

        if aus.len() == 1 {
            let au = aus[0];
            let pos = au.pos as usize;

            if pos > b.len() {
                self.logger.log_error(&format!(
                    "au offset outside the rtp payload. pos={}, len={}",
                    pos,
                    b.len()
                ));
                return None;
            }

            if au.size as usize <= b.len() - pos {
                // One complete access unit
                let out = AvPacket {
                    payload_type: self.payload_type,
                    timestamp: first_timestamp / (self.clock_rate / 1000),
                    payload: b[pos..pos + au.size as usize].to_vec(),
                };
                (self.on_av_packet)(out);

                list.advance(1);
                return Some(first_seq);
            }

            // A fragment. The declared size and the RTP timestamp identify
            // the run; the marker bit is not consulted
            return self.unpack_fragmented(list, au.size, first_timestamp, first_seq, &b[pos..]);
        }

        // One packet carrying several complete access units. Such packets
        // never fragment in this mode, so the whole packet resolves here
        let mut slices = Vec::with_capacity(aus.len());
        for au in &aus {
            let pos = au.pos as usize;
            let size = au.size as usize;
            if pos > b.len() || size > b.len() - pos {
                self.logger.log_error(&format!(
                    "au descriptor outside the rtp payload. pos={}, size={}, len={}",
                    au.pos,
                    au.size,
                    b.len()
                ));
                return None;
            }
            slices.push((pos, size));
        }

        for (i, (pos, size)) in slices.into_iter().enumerate() {
            let mut timestamp = first_timestamp / (self.clock_rate / 1000);
            timestamp += i as u32 * (AAC_SAMPLES_PER_FRAME * 1000) / self.clock_rate;

            let out = AvPacket {
                payload_type: self.payload_type,
                timestamp,
                payload: b[pos..pos + size].to_vec(),
            };
            (self.on_av_packet)(out);
        }

        list.advance(1);
        Some(first_seq)
    }

    /// Walks the packets after the head, accumulating fragments of one
    /// access unit until the declared size is reached
    fn unpack_fragmented(
        &mut self,
        list: &mut RtpPacketList,
        total_size: u32,
        timestamp: u32,
        first_seq: u16,
        first_part: &[u8],
    ) -> Option<u16> {
        let mut parts: Vec<Vec<u8>> = vec![first_part.to_vec()];
        let mut cache_size = first_part.len() as u32;

        let mut prev_seq = first_seq;
        let mut index = 1;

        loop {
            let (seq, curr_timestamp, part) = {
                let p = list.get(index)?;

                if sub_seq(p.header.seq, prev_seq) != 1 {
                    // A gap; the caller may retry once reordering fills it
                    return None;
                }
                if p.header.timestamp != timestamp {
                    self.logger.log_error(&format!(
                        "fragments of one access unit must share a timestamp. first={}, curr={}",
                        timestamp, p.header.timestamp
                    ));
                    return None;
                }

                let pb = p.payload();
                let aus = parse_au_headers(pb, &self.logger);

                if aus.len() != 1 {
                    self.logger.log_error(&format!(
                        "fragment continuation must carry a single au header. count={}",
                        aus.len()
                    ));
                    return None;
                }
                if aus[0].size != total_size {
                    self.logger.log_error(&format!(
                        "fragments of one access unit must declare the same size. first={}, curr={}",
                        total_size, aus[0].size
                    ));
                    return None;
                }

                let pos = aus[0].pos as usize;
                if pos > pb.len() {
                    self.logger.log_error(&format!(
                        "au offset outside the rtp payload. pos={}, len={}",
                        pos,
                        pb.len()
                    ));
                    return None;
                }

                (p.header.seq, p.header.timestamp, pb[pos..].to_vec())
            };

            cache_size += part.len() as u32;
            parts.push(part);
            prev_seq = seq;

            if cache_size < total_size {
                index += 1;
            } else if cache_size == total_size {
                let mut payload = Vec::with_capacity(total_size as usize);
                for part in &parts {
                    payload.extend_from_slice(part);
                }

                let out = AvPacket {
                    payload_type: self.payload_type,
                    timestamp: curr_timestamp / (self.clock_rate / 1000),
                    payload,
                };
                (self.on_av_packet)(out);

                list.advance(index + 1);
                return Some(seq);
            } else {
                self.logger.log_error(&format!(
                    "fragment run overran the declared access unit size. cache_size={}, total_size={}",
                    cache_size, total_size
                ));
                return None;
            }
        }
    }
}
