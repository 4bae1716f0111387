//! Classification of a repository's tags into group buckets.

use super::TagRecord;

/// Reserved bucket name for tags that match no group.
pub const OTHERS_BUCKET: &str = "others";

/// One named bucket of a classification.
///
/// Members are indices into the owning [`ClassificationResult`], in the
/// order the registry listed the tags (newest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    name: String,
    members: Vec<usize>,
}

impl Bucket {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, index: usize) {
        self.members.push(index);
    }

    /// Bucket name: a group name or [`OTHERS_BUCKET`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for the `others` bucket.
    #[must_use]
    pub fn is_others(&self) -> bool {
        self.name == OTHERS_BUCKET
    }

    /// Tag indices, newest first.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Number of tags in the bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the bucket holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Tags of one repository partitioned into buckets.
///
/// Each tag is stored once; buckets refer to it by index so that a tag
/// present in several buckets shares a single `marked_for_deletion` flag.
/// The `others` bucket always comes first, followed by groups in the order
/// they were supplied to the classifier.
#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    tags: Vec<TagRecord>,
    buckets: Vec<Bucket>,
}

impl ClassificationResult {
    pub(crate) const fn from_parts(tags: Vec<TagRecord>, buckets: Vec<Bucket>) -> Self {
        Self { tags, buckets }
    }

    /// All classified tags in listing order.
    #[must_use]
    pub fn tags(&self) -> &[TagRecord] {
        &self.tags
    }

    /// Buckets in processing order.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Looks up a bucket by name.
    #[must_use]
    pub fn bucket(&self, name: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    /// Iterates the tags of `bucket` with their indices, newest first.
    pub fn members<'a>(
        &'a self,
        bucket: &'a Bucket,
    ) -> impl Iterator<Item = (usize, &'a TagRecord)> + 'a {
        bucket
            .members
            .iter()
            .filter_map(|&index| self.tags.get(index).map(|tag| (index, tag)))
    }

    /// Tag names of the named bucket, newest first. Empty if the bucket does not exist.
    #[must_use]
    pub fn bucket_tag_names(&self, name: &str) -> Vec<&str> {
        self.bucket(name)
            .map(|bucket| {
                self.members(bucket)
                    .map(|(_, tag)| tag.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Marks the tag at `index` for deletion. Out-of-range indices are ignored.
    pub fn mark(&mut self, index: usize) {
        if let Some(tag) = self.tags.get_mut(index) {
            tag.marked_for_deletion = true;
        }
    }

    /// Tags currently marked for deletion, in listing order.
    pub fn marked(&self) -> impl Iterator<Item = &TagRecord> {
        self.tags.iter().filter(|t| t.marked_for_deletion)
    }

    /// Number of tags marked for deletion.
    #[must_use]
    pub fn marked_count(&self) -> usize {
        self.marked().count()
    }

    /// Number of distinct tags classified.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Returns `true` if the repository had no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> ClassificationResult {
        let now = Utc::now();
        let tags = vec![
            TagRecord::new("v2", "sha256:02", now),
            TagRecord::new("v1", "sha256:01", now),
        ];
        let mut others = Bucket::new(OTHERS_BUCKET);
        others.push(1);
        let mut release = Bucket::new("release");
        release.push(0);
        release.push(1);
        ClassificationResult::from_parts(tags, vec![others, release])
    }

    #[test]
    fn test_mark_is_shared_across_buckets() {
        let mut result = sample();
        result.mark(1);
        let release = result.bucket("release").expect("release bucket");
        let marked: Vec<bool> = result
            .members(release)
            .map(|(_, t)| t.marked_for_deletion)
            .collect();
        assert_eq!(marked, vec![false, true]);
        let others = result.bucket(OTHERS_BUCKET).expect("others bucket");
        assert!(result.members(others).all(|(_, t)| t.marked_for_deletion));
        assert_eq!(result.marked_count(), 1);
    }

    #[test]
    fn test_mark_out_of_range_is_ignored() {
        let mut result = sample();
        result.mark(42);
        assert_eq!(result.marked_count(), 0);
    }

    #[test]
    fn test_unknown_bucket_has_no_names() {
        assert!(sample().bucket_tag_names("missing").is_empty());
    }
}
