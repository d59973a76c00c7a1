//! Language-model providers for Sahayak.
//!
//! All providers implement the `sahayak_core::Provider` trait.
//! The router builds the configured backend.

pub mod gemini;
mod http;
pub mod openai_compat;
pub mod router;

pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};
