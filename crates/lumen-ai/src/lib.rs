//! Client for the generative image service.
//!
//! Provides the three capabilities the enhancement loop consumes
//! (enhance, critique, surgical edit) as traits, a Gemini-backed
//! implementation, and the adapter that coerces critique payloads into
//! [`lumen_models::Critique`].

pub mod client;
pub mod critique;
pub mod error;
pub mod service;
pub mod types;

pub use client::{AiClientConfig, GeminiClient};
pub use critique::coerce_critique;
pub use error::{AiError, AiResult};
pub use service::{AiServices, ImageCritic, ImageEnhancer, SurgicalEditor};
