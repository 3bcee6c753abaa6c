// AV packet model

/// Payload type of a depacketized AV packet
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AvPayloadType {
    Unknown,
    Avc,
    Aac,
}

/// One depacketized media frame
pub struct AvPacket {
    /// Payload type
    pub payload_type: AvPayloadType,

    /// Timestamp in milliseconds
    pub timestamp: u32,

    /// Frame payload
    pub payload: Vec<u8>,
}

/// Callback receiving depacketized AV packets
///
/// Invoked on the caller's task. Must not re-enter the unpacker
/// that produced the packet.
pub type OnAvPacket = Box<dyn FnMut(AvPacket) + Send>;
