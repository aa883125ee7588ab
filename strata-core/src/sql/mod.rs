mod communicator;
mod driver;
mod writer;

pub use communicator::*;
pub use driver::*;
pub use writer::*;
