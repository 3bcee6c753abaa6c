// Utils module

mod conn_stat;
mod env;
mod unique_key;

pub use conn_stat::*;
pub use env::*;
pub use unique_key::*;
