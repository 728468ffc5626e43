pub mod catalog;
pub mod cataloger;
pub mod filters;
pub mod history;
pub mod ingest;
pub mod scheduler;
pub mod selector;

pub use catalog::{AssetCatalog, BucketCounts, LevelConfidence, TimeBucket};
pub use cataloger::{CatalogContext, Cataloger, RunReport};
pub use filters::{CandleFilter, FilterBank, Tally};
pub use history::HistoryIndex;
pub use ingest::{counterpart_asset, normalize_asset, IngestedFeed, Ingestor};
pub use scheduler::{Schedule, Scheduler};
pub use selector::SelectionPolicy;
