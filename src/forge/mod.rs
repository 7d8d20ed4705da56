//! The character pipeline: options in, sanitized record (and portrait) out.

pub mod args;
pub mod options;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod sanitize;
pub mod schema;

pub use options::GenerationOptions;
pub use pipeline::{CharacterForge, ForgeError};
pub use record::{CharacterRecord, GeneratedCharacter};
