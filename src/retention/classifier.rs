//! Tag classification.

use crate::models::{Bucket, ClassificationResult, OTHERS_BUCKET, TagGroup, TagRecord};

/// Partitions a tag listing into one bucket per group plus `others`.
///
/// A tag goes into the bucket of every group whose pattern occurs in its
/// name. A tag matching no group goes into `others`, so it is never in
/// `others` and a group at the same time. Bucket order follows the group
/// slice, with `others` first; members keep the listing order.
#[derive(Debug, Clone, Copy)]
pub struct TagClassifier<'a> {
    groups: &'a [TagGroup],
}

impl<'a> TagClassifier<'a> {
    /// Creates a classifier over compiled groups.
    #[must_use]
    pub const fn new(groups: &'a [TagGroup]) -> Self {
        Self { groups }
    }

    /// Classifies `tags`, which must be ordered newest first.
    #[must_use]
    pub fn classify(&self, tags: Vec<TagRecord>) -> ClassificationResult {
        let mut others = Bucket::new(OTHERS_BUCKET);
        let mut buckets: Vec<Bucket> = self.groups.iter().map(|g| Bucket::new(g.name())).collect();

        for (index, tag) in tags.iter().enumerate() {
            let mut matched = false;
            for (group, bucket) in self.groups.iter().zip(buckets.iter_mut()) {
                if group.matches(&tag.name) {
                    bucket.push(index);
                    matched = true;
                }
            }
            if !matched {
                others.push(index);
            }
        }

        let mut ordered = Vec::with_capacity(buckets.len() + 1);
        ordered.push(others);
        ordered.extend(buckets);
        ClassificationResult::from_parts(tags, ordered)
    }
}
