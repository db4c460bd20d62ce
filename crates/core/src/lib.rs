//! MudSync Core - Fundamental types shared by every layer of the client

mod error;
mod types;
mod positions;

pub use error::*;
pub use types::*;
pub use positions::*;
