//! Streamed reply handling
//!
//! Decoding turns raw body chunks into text increments; coalescing decides
//! when those increments become visible.

mod coalesce;
mod decoder;

#[cfg(test)]
mod proptests;

pub use coalesce::{CoalescePolicy, Coalescer};
pub use decoder::{decode_text, Utf8StreamDecoder};
