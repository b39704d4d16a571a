//! gembridge - uniform content generation over swappable backends
//!
//! This library presents a single content-generation interface that can be
//! backed by the native Gemini API or any OpenAI-compatible HTTP endpoint,
//! selected purely by configuration with no call-site changes.
//!
//! Callers depend only on the [`provider::ContentGenerator`] contract; the
//! active backend is built once per session by
//! [`provider::create_content_generator`] from a
//! [`config::ContentGeneratorConfig`].

pub mod config;
pub mod content;
pub mod error;
pub mod extract;
pub mod provider;

pub use config::{AuthType, ContentGeneratorConfig, OpenAiCompatConfig};
pub use content::{GenerateContentRequest, GenerateContentResponse};
pub use error::{Error, Result};
pub use provider::{create_content_generator, CodeAssistFactory, ContentGenerator, ContentStream};
