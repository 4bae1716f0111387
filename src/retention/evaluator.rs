//! Keep-count evaluation.

use crate::models::{ClassificationResult, OTHERS_BUCKET, TagGroup};
use tracing::debug;

/// Marks tags beyond each group's keep count for deletion.
///
/// Marks are only ever set, never cleared, so evaluating the same
/// classification again yields the same marks.
#[derive(Debug, Clone, Copy)]
pub struct RetentionEvaluator<'a> {
    groups: &'a [TagGroup],
}

impl<'a> RetentionEvaluator<'a> {
    /// Creates an evaluator over compiled groups.
    #[must_use]
    pub const fn new(groups: &'a [TagGroup]) -> Self {
        Self { groups }
    }

    /// Marks tags in `result`.
    ///
    /// With `delete_others` every tag of the `others` bucket is marked. For
    /// each group the first `min(keep_count, len)` members are kept and the
    /// rest marked. Groups without a bucket in `result` are ignored.
    pub fn evaluate(&self, result: &mut ClassificationResult, delete_others: bool) {
        let mut to_mark = Vec::new();

        if delete_others
            && let Some(others) = result.bucket(OTHERS_BUCKET)
        {
            to_mark.extend_from_slice(others.members());
        }

        for group in self.groups {
            let Some(bucket) = result.bucket(group.name()) else {
                continue;
            };
            let keep = group.keep_count().min(bucket.len());
            debug!(
                group = group.name(),
                bucket_len = bucket.len(),
                keep,
                "Evaluating tag group"
            );
            to_mark.extend(
                bucket
                    .members()
                    .iter()
                    .enumerate()
                    .filter(|(rank, _)| *rank >= keep)
                    .map(|(_, &index)| index),
            );
        }

        for index in to_mark {
            result.mark(index);
        }
    }
}
