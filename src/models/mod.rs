//! Data models for tagsweep.
//!
//! Plain data carried through a retention run: registry records, compiled
//! tag groups, the classification produced from them and run statistics.

mod classification;
mod group;
mod stats;
mod tag;

pub use classification::{Bucket, ClassificationResult, OTHERS_BUCKET};
pub use group::{GroupSpec, TagGroup};
pub use stats::{PurgeStats, RepositoryRunCounters};
pub use tag::{ManifestRecord, TagRecord};
