// RTMP module

mod composer;
mod constants;
mod stream;

pub use composer::*;
pub use constants::*;
pub use stream::*;
