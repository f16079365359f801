pub mod config;
pub mod entities;
pub mod extracted;
pub mod output;
pub mod phase;
pub mod request;

pub use config::{Config, ConfigError};
pub use entities::*;
pub use output::*;
pub use phase::{EntityCategory, Phase, entity_id};
pub use request::{AnalysisRequest, ContextChunk};
