//! Tag sets, tag diffs and the in-memory tag index.

use std::collections::{BTreeSet, HashMap};

/// Tags carried by one entry. Set semantics: duplicates collapse.
pub type TagSet = BTreeSet<String>;

/// Collect tags into a [`TagSet`].
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter().map(|tag| tag.as_ref().to_string()).collect()
}

/// Index changes needed to move an entry from one tag set to another.
///
/// Writes only touch the delta instead of rewriting every association.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDiff {
    /// Tags the entry gains (`new \ old`).
    pub added: TagSet,
    /// Tags the entry loses (`old \ new`).
    pub removed: TagSet,
}

impl TagDiff {
    pub fn between(old: &TagSet, new: &TagSet) -> Self {
        Self {
            added: new.difference(old).cloned().collect(),
            removed: old.difference(new).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Reverse mapping `tag -> identifiers`.
///
/// Tags with no remaining identifiers are dropped so the index never holds
/// empty sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    by_tag: HashMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a diff for one identifier.
    pub fn apply(&mut self, identifier: &str, diff: &TagDiff) {
        for tag in &diff.removed {
            self.unlink(tag, identifier);
        }
        for tag in &diff.added {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(identifier.to_string());
        }
    }

    /// Associate `identifier` with every tag in `tags`.
    pub fn insert(&mut self, identifier: &str, tags: &TagSet) {
        self.apply(
            identifier,
            &TagDiff {
                added: tags.clone(),
                removed: TagSet::new(),
            },
        );
    }

    /// Drop `identifier` from every tag in `tags`.
    pub fn remove_identifier(&mut self, identifier: &str, tags: &TagSet) {
        for tag in tags {
            self.unlink(tag, identifier);
        }
    }

    pub fn identifiers(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.by_tag.get(tag)
    }

    /// Remove a tag entirely, returning the identifiers it held.
    pub fn take(&mut self, tag: &str) -> BTreeSet<String> {
        self.by_tag.remove(tag).unwrap_or_default()
    }

    /// Drop identifiers for which `keep` returns false. Returns how many
    /// associations were removed.
    pub fn retain_identifiers<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = 0;
        self.by_tag.retain(|_, identifiers| {
            let before = identifiers.len();
            identifiers.retain(|identifier| keep(identifier));
            removed += before - identifiers.len();
            !identifiers.is_empty()
        });
        removed
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_tag.clear();
    }

    fn unlink(&mut self, tag: &str, identifier: &str) {
        if let Some(identifiers) = self.by_tag.get_mut(tag) {
            identifiers.remove(identifier);
            if identifiers.is_empty() {
                self.by_tag.remove(tag);
            }
        }
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_tags() -> impl Strategy<Value = TagSet> {
        prop::collection::btree_set("[a-e]", 0..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Applying the diff to the old set always yields the new set.
        #[test]
        fn prop_diff_transforms_old_into_new(old in arb_tags(), new in arb_tags()) {
            let diff = TagDiff::between(&old, &new);
            let mut result: TagSet = old.difference(&diff.removed).cloned().collect();
            result.extend(diff.added.iter().cloned());
            prop_assert_eq!(result, new);
            prop_assert!(diff.added.is_disjoint(&diff.removed));
        }

        /// After a sequence of rewrites the index only reflects the last tag set.
        #[test]
        fn prop_index_tracks_latest_tags(sets in prop::collection::vec(arb_tags(), 1..6)) {
            let mut index = TagIndex::new();
            let mut current = TagSet::new();
            for next in &sets {
                index.apply("id", &TagDiff::between(&current, next));
                current = next.clone();
            }
            for tag in ["a", "b", "c", "d", "e"] {
                let indexed = index.identifiers(tag).is_some_and(|ids| ids.contains("id"));
                prop_assert_eq!(indexed, current.contains(tag));
            }
        }
    }
}
