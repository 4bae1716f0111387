//! Property-based tests for classification and retention.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Every tag is in `others` xor in every group it matches
//! - Each group keeps exactly its newest `min(keep, len)` tags
//! - Evaluation is idempotent
//! - Bucket order follows input order

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tagsweep::{
    ClassificationResult, GroupSpec, OTHERS_BUCKET, RetentionEvaluator, TagClassifier, TagGroup,
    TagRecord,
};

/// Tag names drawn from a small alphabet so groups overlap often.
fn tag_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("(v|rc|dev|build)-[0-9]{1,3}(-rc)?", 0..40)
        .prop_map(|set| set.into_iter().collect())
}

fn group_specs() -> impl Strategy<Value = Vec<GroupSpec>> {
    (0usize..6, 0usize..6, 0usize..6).prop_map(|(release, candidates, dev)| {
        vec![
            GroupSpec::new("candidates", "rc", candidates),
            GroupSpec::new("dev", "^dev-", dev),
            GroupSpec::new("release", r"^v-\d+$", release),
        ]
    })
}

/// Builds records newest first in the given order.
fn records(names: &[String]) -> Vec<TagRecord> {
    let base = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid timestamp");
    let count = i64::try_from(names.len()).unwrap();
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let offset = count - i64::try_from(i).unwrap();
            TagRecord::new(
                name.clone(),
                format!("sha256:{i:04}"),
                base + Duration::seconds(offset),
            )
        })
        .collect()
}

fn classify(groups: &[TagGroup], names: &[String]) -> ClassificationResult {
    TagClassifier::new(groups).classify(records(names))
}

proptest! {
    /// Property: a tag is in `others` iff it matches no group, and otherwise
    /// in exactly the buckets of the groups it matches.
    #[test]
    fn prop_membership_follows_matches(names in tag_names(), specs in group_specs()) {
        let groups = TagGroup::compile_all(specs).unwrap();
        let result = classify(&groups, &names);

        for (index, tag) in result.tags().iter().enumerate() {
            let matching: Vec<&str> = groups
                .iter()
                .filter(|g| g.matches(&tag.name))
                .map(TagGroup::name)
                .collect();
            let containing: Vec<&str> = result
                .buckets()
                .iter()
                .filter(|b| b.members().contains(&index))
                .map(|b| b.name())
                .collect();

            if matching.is_empty() {
                prop_assert_eq!(containing, vec![OTHERS_BUCKET]);
            } else {
                prop_assert_eq!(containing, matching);
            }
        }
    }

    /// Property: each group keeps exactly its newest `min(keep, len)` members.
    #[test]
    fn prop_kept_is_newest_prefix(names in tag_names(), specs in group_specs()) {
        let groups = TagGroup::compile_all(specs).unwrap();
        let mut result = classify(&groups, &names);
        RetentionEvaluator::new(&groups).evaluate(&mut result, false);

        for group in &groups {
            let bucket = result.bucket(group.name()).expect("bucket per group");
            let keep = group.keep_count().min(bucket.len());
            for (rank, (_, tag)) in result.members(bucket).enumerate() {
                if rank >= keep {
                    prop_assert!(tag.marked_for_deletion, "{} beyond keep", tag.name);
                }
            }
        }

        // A tag survives only if every group it belongs to kept it.
        for (index, tag) in result.tags().iter().enumerate() {
            let kept_somewhere = groups.iter().any(|group| {
                let bucket = result.bucket(group.name()).expect("bucket per group");
                let keep = group.keep_count().min(bucket.len());
                bucket.members().iter().take(keep).any(|&i| i == index)
            });
            let dropped_somewhere = groups.iter().any(|group| {
                let bucket = result.bucket(group.name()).expect("bucket per group");
                let keep = group.keep_count().min(bucket.len());
                bucket.members().iter().skip(keep).any(|&i| i == index)
            });
            if kept_somewhere && !dropped_somewhere {
                prop_assert!(!tag.marked_for_deletion);
            }
        }
    }

    /// Property: evaluating twice marks the same tags as evaluating once.
    #[test]
    fn prop_evaluation_is_idempotent(
        names in tag_names(),
        specs in group_specs(),
        delete_others in any::<bool>(),
    ) {
        let groups = TagGroup::compile_all(specs).unwrap();
        let evaluator = RetentionEvaluator::new(&groups);

        let mut once = classify(&groups, &names);
        evaluator.evaluate(&mut once, delete_others);
        let mut twice = once.clone();
        evaluator.evaluate(&mut twice, delete_others);

        let once_marks: Vec<bool> = once.tags().iter().map(|t| t.marked_for_deletion).collect();
        let twice_marks: Vec<bool> = twice.tags().iter().map(|t| t.marked_for_deletion).collect();
        prop_assert_eq!(once_marks, twice_marks);
    }

    /// Property: `others` tags are marked iff `delete_others` is set.
    #[test]
    fn prop_others_follow_flag(names in tag_names(), delete_others in any::<bool>()) {
        let groups = TagGroup::compile_all(vec![GroupSpec::new("release", r"^v-\d+$", 100)]).unwrap();
        let mut result = classify(&groups, &names);
        RetentionEvaluator::new(&groups).evaluate(&mut result, delete_others);

        let others = result.bucket(OTHERS_BUCKET).expect("others bucket");
        for (_, tag) in result.members(others) {
            prop_assert_eq!(tag.marked_for_deletion, delete_others);
        }
    }

    /// Property: bucket members keep the listing order.
    #[test]
    fn prop_bucket_order_follows_input(names in tag_names(), specs in group_specs()) {
        let groups = TagGroup::compile_all(specs).unwrap();
        let result = classify(&groups, &names);

        for bucket in result.buckets() {
            let members = bucket.members();
            prop_assert!(members.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
