//! Tag groups.

use super::OTHERS_BUCKET;
use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A named retention rule: tags whose name matches `pattern` form one group
/// of which the `keep_count` newest are retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    /// Group name; also the bucket key in a classification.
    pub name: String,
    /// Regular expression searched in the tag name.
    pub pattern: String,
    /// Number of newest tags to keep.
    pub keep_count: usize,
}

impl GroupSpec {
    /// Creates a group spec.
    #[must_use]
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, keep_count: usize) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            keep_count,
        }
    }
}

/// A [`GroupSpec`] with its pattern compiled.
#[derive(Debug, Clone)]
pub struct TagGroup {
    spec: GroupSpec,
    regex: Regex,
}

impl TagGroup {
    /// Compiles the pattern of `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the group is named `others`, or
    /// [`Error::InvalidPattern`] if the regex does not compile.
    pub fn compile(spec: GroupSpec) -> Result<Self> {
        if spec.name == OTHERS_BUCKET {
            return Err(Error::Configuration(format!(
                "tag group name '{OTHERS_BUCKET}' is reserved"
            )));
        }
        let regex = Regex::new(&spec.pattern).map_err(|e| Error::InvalidPattern {
            group: spec.name.clone(),
            cause: e.to_string(),
        })?;
        Ok(Self { spec, regex })
    }

    /// Compiles every spec, failing on the first bad pattern.
    ///
    /// # Errors
    ///
    /// Returns the error of the first spec that does not compile.
    pub fn compile_all(specs: impl IntoIterator<Item = GroupSpec>) -> Result<Vec<Self>> {
        specs.into_iter().map(Self::compile).collect()
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Number of newest tags to keep.
    #[must_use]
    pub const fn keep_count(&self) -> usize {
        self.spec.keep_count
    }

    /// The uncompiled spec.
    #[must_use]
    pub const fn spec(&self) -> &GroupSpec {
        &self.spec
    }

    /// Returns `true` if the pattern occurs anywhere in `tag_name`.
    #[must_use]
    pub fn matches(&self, tag_name: &str) -> bool {
        self.regex.is_match(tag_name)
    }
}
