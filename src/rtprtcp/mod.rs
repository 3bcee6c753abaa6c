// RTP/RTCP module

mod aac;
mod av_packet;
mod packet;
mod packet_list;
mod seq;

pub use aac::*;
pub use av_packet::*;
pub use packet::*;
pub use packet_list::*;
pub use seq::*;
