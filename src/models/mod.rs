pub mod connection;
pub mod proxy;
pub mod rule;
pub mod state;
pub mod verdict;

pub use connection::*;
pub use proxy::*;
pub use rule::*;
pub use state::*;
pub use verdict::*;
