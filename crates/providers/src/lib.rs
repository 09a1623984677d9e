//! Chat completion service clients for AlterEgo.
//!
//! All providers implement the `alterego_core::Provider` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
