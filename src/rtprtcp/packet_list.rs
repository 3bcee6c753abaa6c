// Ordered RTP packet list

use std::collections::VecDeque;

use super::{sub_seq, RtpPacket};

/// Ordered list of RTP packets awaiting depacketization
///
/// Packets are kept sorted by sequence number, wrap aware, so the unpacker
/// always sees the oldest packet at the front. An unpacker run either
/// leaves the list untouched or advances past a contiguous run.
pub struct RtpPacketList {
    packets: VecDeque<RtpPacket>,
}

impl RtpPacketList {
    /// Creates new empty RtpPacketList
    pub fn new() -> RtpPacketList {
        RtpPacketList {
            packets: VecDeque::new(),
        }
    }

    /// Number of packets held
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// True when no packets are held
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Gets the oldest packet
    pub fn front(&self) -> Option<&RtpPacket> {
        self.packets.front()
    }

    /// Gets the packet at the given position from the front
    pub fn get(&self, index: usize) -> Option<&RtpPacket> {
        self.packets.get(index)
    }

    /// Removes the first n packets
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.packets.len());
        self.packets.drain(..n);
    }

    /// Inserts a packet at its position in sequence order
    ///
    /// Exact duplicates (same sequence number as a held packet near the
    /// insertion point) are dropped.
    pub fn push_ordered(&mut self, pkt: RtpPacket) {
        // In-order arrivals land at the back, scan from there
        let mut index = self.packets.len();

        while index > 0 {
            let diff = sub_seq(pkt.header.seq, self.packets[index - 1].header.seq);
            if diff == 0 {
                return;
            }
            if diff > 0 {
                break;
            }
            index -= 1;
        }

        self.packets.insert(index, pkt);
    }
}

impl Default for RtpPacketList {
    fn default() -> RtpPacketList {
        RtpPacketList::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtprtcp::parse_rtp_packet;
    use byteorder::{BigEndian, ByteOrder};

    fn make_packet(seq: u16) -> RtpPacket {
        let mut raw = vec![0_u8; 12];
        raw[0] = 0x80;
        BigEndian::write_u16(&mut raw[2..4], seq);
        parse_rtp_packet(raw).unwrap()
    }

    fn seqs(list: &RtpPacketList) -> Vec<u16> {
        (0..list.len())
            .map(|i| list.get(i).unwrap().header.seq)
            .collect()
    }

    #[test]
    fn test_push_ordered_sorts_out_of_order_arrivals() {
        let mut list = RtpPacketList::new();

        list.push_ordered(make_packet(10));
        list.push_ordered(make_packet(12));
        list.push_ordered(make_packet(11));

        assert_eq!(seqs(&list), vec![10, 11, 12]);
    }

    #[test]
    fn test_push_ordered_is_wrap_aware() {
        let mut list = RtpPacketList::new();

        list.push_ordered(make_packet(0xFFFE));
        list.push_ordered(make_packet(0x0001));
        list.push_ordered(make_packet(0x0000));
        list.push_ordered(make_packet(0xFFFF));

        assert_eq!(seqs(&list), vec![0xFFFE, 0xFFFF, 0x0000, 0x0001]);
    }

    #[test]
    fn test_push_ordered_drops_duplicates() {
        let mut list = RtpPacketList::new();

        list.push_ordered(make_packet(5));
        list.push_ordered(make_packet(5));

        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_advance() {
        let mut list = RtpPacketList::new();

        list.push_ordered(make_packet(1));
        list.push_ordered(make_packet(2));
        list.push_ordered(make_packet(3));

        list.advance(2);

        assert_eq!(seqs(&list), vec![3]);

        list.advance(5);

        assert!(list.is_empty());
    }
}
