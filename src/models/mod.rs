pub mod endpoint;
pub mod exchange;
pub mod slot;

pub use endpoint::*;
pub use exchange::*;
pub use slot::*;
