//! Namespace-scoped key layout for the key-value adapter.
//!
//! A [`NamespaceKeys`] can only be built from a key prefix and a namespace,
//! so every key the adapter touches carries the namespace. Identifiers and
//! tags are validated to exclude `:`, which keeps the layout unambiguous.

/// Separator between key segments.
const SEPARATOR: char = ':';

/// The role a raw key plays in the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// `entry:{id}`, the encoded record.
    Entry,
    /// `entries`, set of every stored identifier.
    Entries,
    /// `tags:{id}`, set of the tags one entry carries.
    EntryTags,
    /// `tag:{tag}`, tag index set.
    Tag,
    /// `frozen`, the freeze marker.
    Frozen,
}

/// Key builder bound to one namespace.
///
/// Layout under `{key_prefix}{namespace}:`:
/// - `entry:{id}`
/// - `entries`
/// - `tags:{id}`
/// - `tag:{tag}`
/// - `frozen`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceKeys {
    /// Private inner data - cannot be constructed externally
    inner: NamespaceKeysInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NamespaceKeysInner {
    namespace: String,
    /// `{key_prefix}{namespace}:`
    root: String,
}

impl NamespaceKeys {
    pub fn new(key_prefix: &str, namespace: &str) -> Self {
        Self {
            inner: NamespaceKeysInner {
                namespace: namespace.to_string(),
                root: format!("{key_prefix}{namespace}{SEPARATOR}"),
            },
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Common prefix of every key in the namespace.
    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn entry(&self, identifier: &str) -> String {
        format!("{}entry{SEPARATOR}{identifier}", self.inner.root)
    }

    pub fn entries(&self) -> String {
        format!("{}entries", self.inner.root)
    }

    pub fn entry_tags(&self, identifier: &str) -> String {
        format!("{}tags{SEPARATOR}{identifier}", self.inner.root)
    }

    pub fn tag(&self, tag: &str) -> String {
        format!("{}{tag}", self.tag_root())
    }

    /// Prefix of every tag index key; scripts append the tag to it.
    pub fn tag_root(&self) -> String {
        format!("{}tag{SEPARATOR}", self.inner.root)
    }

    pub fn frozen(&self) -> String {
        format!("{}frozen", self.inner.root)
    }

    /// SCAN MATCH pattern covering the whole namespace.
    pub fn namespace_pattern(&self) -> String {
        format!("{}*", self.inner.root)
    }

    /// SCAN MATCH pattern covering every tag index set.
    pub fn tag_pattern(&self) -> String {
        format!("{}tag{SEPARATOR}*", self.inner.root)
    }

    /// Split a raw key into its role and trailing name.
    ///
    /// Returns `None` for keys outside this namespace or unknown layouts.
    pub fn classify<'k>(&self, key: &'k str) -> Option<(KeyKind, &'k str)> {
        let rest = key.strip_prefix(self.inner.root.as_str())?;
        match rest {
            "entries" => return Some((KeyKind::Entries, "")),
            "frozen" => return Some((KeyKind::Frozen, "")),
            _ => {}
        }
        let (segment, name) = rest.split_once(SEPARATOR)?;
        if name.is_empty() {
            return None;
        }
        let kind = match segment {
            "entry" => KeyKind::Entry,
            "tags" => KeyKind::EntryTags,
            "tag" => KeyKind::Tag,
            _ => return None,
        };
        Some((kind, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> NamespaceKeys {
        NamespaceKeys::new("tagcache:", "compiled")
    }

    #[test]
    fn test_layout() {
        let keys = keys();
        assert_eq!(keys.namespace(), "compiled");
        assert_eq!(keys.root(), "tagcache:compiled:");
        assert_eq!(keys.entry("a"), "tagcache:compiled:entry:a");
        assert_eq!(keys.entries(), "tagcache:compiled:entries");
        assert_eq!(keys.entry_tags("a"), "tagcache:compiled:tags:a");
        assert_eq!(keys.tag("t"), "tagcache:compiled:tag:t");
        assert_eq!(keys.tag_root(), "tagcache:compiled:tag:");
        assert_eq!(keys.frozen(), "tagcache:compiled:frozen");
        assert_eq!(keys.namespace_pattern(), "tagcache:compiled:*");
        assert_eq!(keys.tag_pattern(), "tagcache:compiled:tag:*");
    }

    #[test]
    fn test_classify() {
        let keys = keys();
        assert_eq!(keys.classify(&keys.entry("x")), Some((KeyKind::Entry, "x")));
        assert_eq!(keys.classify(&keys.entry_tags("x")), Some((KeyKind::EntryTags, "x")));
        assert_eq!(keys.classify(&keys.tag("t-1")), Some((KeyKind::Tag, "t-1")));
        assert_eq!(keys.classify(&keys.entries()), Some((KeyKind::Entries, "")));
        assert_eq!(keys.classify(&keys.frozen()), Some((KeyKind::Frozen, "")));
    }

    #[test]
    fn test_classify_rejects_foreign_keys() {
        let keys = keys();
        assert_eq!(keys.classify("tagcache:other:entry:x"), None);
        assert_eq!(keys.classify("tagcache:compiled:bogus:x"), None);
        assert_eq!(keys.classify("tagcache:compiled:entry:"), None);
    }

    #[test]
    fn test_namespaces_do_not_share_keys() {
        // "ab" + "c" and "a" + "bc" must not collide.
        let first = NamespaceKeys::new("p:", "ab");
        let second = NamespaceKeys::new("p:", "a");
        assert_ne!(first.entry("c"), second.entry("bc"));
        assert_eq!(second.classify(&first.entry("c")), None);
    }
}
