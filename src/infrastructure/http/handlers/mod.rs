//! HTTP Handlers

mod ping;
mod search;

pub use ping::*;
pub use search::*;
