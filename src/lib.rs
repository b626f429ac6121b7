pub mod cli;
pub mod config;
pub mod fetch;
pub mod logger;
pub mod model;
pub mod normalize;
pub mod paths;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod retry;
pub mod sitemap;
pub mod verify;

pub use fetch::{JsonDatasetSource, PostgrestSource, SiteDataSource};
pub use model::SiteData;
pub use paths::{build_paths, BuildOutput, RuleSet};
pub use report::{InputSnapshot, ValidationReport};
pub use verify::{UrlVerifier, VerifyResult};
