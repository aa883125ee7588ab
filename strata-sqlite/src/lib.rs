mod connection;
mod driver;
mod writer;

pub use connection::*;
pub use driver::*;
pub use writer::*;
