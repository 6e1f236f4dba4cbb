//! Feed composition
//!
//! - recall: followed partition plus sampled discovery partition
//! - diversity: per-author cap and bounded same-author runs
//! - pagination: page slicing over the ordered pool
//! - feed: the engine wiring the stages to the stores

pub mod diversity;
pub mod feed;
pub mod pagination;
pub mod recall;

pub use diversity::{longest_author_run, AuthorCapLayer, RunLengthInterleaver};
pub use feed::{FeedEngine, FeedKind};
pub use pagination::paginate;
pub use recall::{CandidateSelector, Candidates, RecallStats};
