//! Retention decisions.
//!
//! Pure, synchronous half of a run: [`TagClassifier`] partitions the tag
//! listing into group buckets and [`RetentionEvaluator`] marks the tags that
//! fall outside each group's keep count. Nothing here talks to the registry.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use tagsweep::models::{GroupSpec, TagGroup, TagRecord};
//! use tagsweep::retention::{RetentionEvaluator, TagClassifier};
//!
//! let groups = TagGroup::compile_all([GroupSpec::new("release", r"^v\d+", 1)]).unwrap();
//! let now = Utc::now();
//! let tags = vec![
//!     TagRecord::new("v2", "sha256:02", now),
//!     TagRecord::new("v1", "sha256:01", now),
//! ];
//!
//! let mut result = TagClassifier::new(&groups).classify(tags);
//! RetentionEvaluator::new(&groups).evaluate(&mut result, false);
//!
//! let marked: Vec<&str> = result.marked().map(|t| t.name.as_str()).collect();
//! assert_eq!(marked, vec!["v1"]);
//! ```

mod classifier;
mod evaluator;

pub use classifier::TagClassifier;
pub use evaluator::RetentionEvaluator;
