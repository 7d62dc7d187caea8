pub mod manager;
pub mod spawn;
pub mod transport;
pub mod unix;

pub use manager::*;
pub use spawn::*;
pub use transport::*;
pub use unix::*;
