pub mod config;
pub mod errors;
pub mod filters;
pub mod index;
pub mod metrics;
pub mod results;
pub mod search;

pub use config::{EncodingMode, SearchOptions};
pub use errors::{SearchError, SearchResult};
pub use index::{ContentIndex, IndexHit, IndexOptions, IndexStats, IndexedFile};
pub use results::{ContextLine, FileResult, Match, SearchOutput};
pub use search::search;
