//! billmail-ingest: turn raw notification email bodies into the text the extractor reads.

pub mod markup;
pub mod normalize;

pub use markup::{looks_like_markup, markup_to_text};
pub use normalize::normalize;
