pub mod client;
pub mod inference;
pub mod prompts;
pub mod types;

pub use client::*;
pub use inference::*;
pub use types::*;
