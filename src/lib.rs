pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{HttpFetcher, LocalStorage, StaticSession, StaticSessionFactory};
pub use config::{builtin_sources, load_sources, select_sources, toml_config::SourcesFile};
pub use core::{aggregator::Aggregator, report::ReportFormat};
pub use domain::model::{AggregateResult, ExtractionQuery, SlotRecord, SourceConfig, StrategyKind, Timeouts};
pub use utils::error::{Result, ScoutError};
