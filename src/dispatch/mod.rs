pub mod dispatcher;
pub mod routing;

pub use dispatcher::*;
pub use routing::*;
