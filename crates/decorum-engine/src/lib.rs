pub mod compiler;
pub mod config;
pub mod error;
pub mod export;
pub mod normalizer;
pub mod providers;
pub mod studio;
pub mod transcription;

pub use config::StudioConfig;
pub use error::{GenerationError, ProviderHttpError, Stream, TransportKind};
pub use studio::{Phase, Studio};
