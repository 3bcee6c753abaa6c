// Live media relay library
//
// Ingest side: RTMP chunk stream composition and RTP/AAC depacketization.
// Egress side: HTTP-FLV subscriber sessions. The accept loops feeding these
// components live outside the crate.

pub mod httpflv;
pub mod log;
pub mod rtmp;
pub mod rtprtcp;
pub mod utils;
