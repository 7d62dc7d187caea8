pub mod codec;
pub mod command;
pub mod message;
pub mod outbound;

pub use codec::*;
pub use command::*;
pub use message::*;
pub use outbound::*;
