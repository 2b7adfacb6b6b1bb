pub mod config;
pub mod error;
pub mod identifier;
pub mod metadata;
pub mod pdf;
pub mod quality;
pub mod ratelimit;
pub mod resolver;
pub mod retry;
pub mod sources;

pub use config::Config;
pub use error::{Error, Result};
pub use identifier::{detect_identifier, Identifier};
pub use quality::QualityGate;
pub use resolver::result::{
    AttemptErrorKind, AttemptOutcome, PaperMetadata, PaperResult, SourceAttempt,
};
pub use resolver::FullTextResolver;
pub use retry::RetryPolicy;
pub use sources::{FetchRequest, SourceContent, SourceStrategy};
