pub mod client;
pub mod gemini;
pub mod media;

pub use client::{ClientError, GenerationClient, ProfileRequest};
pub use gemini::GeminiClient;
