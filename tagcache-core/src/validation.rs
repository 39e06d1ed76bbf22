//! Identifier and tag validation.
//!
//! Identifiers and tags end up inside Redis keys, SQL rows and, for some
//! deployments, file names. Both are restricted to a small safe character
//! class and bounded in length before they reach any adapter.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

/// Upper bound on identifier and tag length regardless of environment.
pub const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 250;

/// Letters, digits, `_`, `-`, `%` and `&`.
static SAFE_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_%&\-]+$").expect("static pattern compiles"));

/// Validates identifiers and tags against a length bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    max_length: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDENTIFIER_LENGTH)
    }
}

impl Validator {
    /// Create a validator accepting values up to `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    /// Derive the bound from the maximum path length of the environment.
    ///
    /// `reserved` is the number of bytes the storage layout adds around an
    /// identifier (directory, namespace prefix, suffixes). The result never
    /// exceeds [`DEFAULT_MAX_IDENTIFIER_LENGTH`].
    pub fn from_max_path_length(max_path_length: usize, reserved: usize) -> Self {
        Self::new(
            max_path_length
                .saturating_sub(reserved)
                .min(DEFAULT_MAX_IDENTIFIER_LENGTH),
        )
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Validate an entry identifier.
    pub fn validate_identifier(&self, identifier: &str) -> Result<(), ValidationError> {
        self.check(identifier)
            .map_err(|reason| ValidationError::InvalidIdentifier {
                identifier: identifier.to_string(),
                reason,
            })
    }

    /// Validate a single tag.
    pub fn validate_tag(&self, tag: &str) -> Result<(), ValidationError> {
        self.check(tag).map_err(|reason| ValidationError::InvalidTag {
            tag: tag.to_string(),
            reason,
        })
    }

    /// Validate every tag, stopping at the first failure.
    pub fn validate_tags<I, S>(&self, tags: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .try_for_each(|tag| self.validate_tag(tag.as_ref()))
    }

    fn check(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Err("must not be empty".to_string());
        }
        if value.len() > self.max_length {
            return Err(format!(
                "length {} exceeds maximum of {}",
                value.len(),
                self.max_length
            ));
        }
        if !SAFE_CHARACTERS.is_match(value) {
            return Err("only letters, digits, '_', '-', '%' and '&' are allowed".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_safe_characters() {
        let validator = Validator::default();
        for value in ["abc", "A_b-C", "100%", "a&b", "Flow_Object_Classes-9"] {
            assert!(validator.validate_identifier(value).is_ok(), "{value}");
            assert!(validator.validate_tag(value).is_ok(), "{value}");
        }
    }

    #[test]
    fn test_rejects_empty() {
        let err = Validator::default()
            .validate_identifier("")
            .expect_err("empty identifier must fail");
        assert!(matches!(err, ValidationError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_rejects_unsafe_characters() {
        let validator = Validator::default();
        for value in ["a b", "a:b", "a/b", "a*", "ü", "a.b", "line\nbreak"] {
            assert!(validator.validate_identifier(value).is_err(), "{value:?}");
            assert!(
                matches!(
                    validator.validate_tag(value),
                    Err(ValidationError::InvalidTag { .. })
                ),
                "{value:?}"
            );
        }
    }

    #[test]
    fn test_length_bound() {
        let validator = Validator::new(4);
        assert!(validator.validate_identifier("abcd").is_ok());
        assert!(validator.validate_identifier("abcde").is_err());
    }

    #[test]
    fn test_from_max_path_length() {
        assert_eq!(Validator::from_max_path_length(100, 40).max_length(), 60);
        assert_eq!(Validator::from_max_path_length(4096, 40).max_length(), 250);
        assert_eq!(Validator::from_max_path_length(10, 40).max_length(), 0);
    }

    #[test]
    fn test_validate_tags_reports_first_bad_tag() {
        let err = Validator::default()
            .validate_tags(["good", "bad tag", "also bad"])
            .expect_err("tag with space must fail");
        assert_eq!(
            err,
            ValidationError::InvalidTag {
                tag: "bad tag".to_string(),
                reason: "only letters, digits, '_', '-', '%' and '&' are allowed".to_string(),
            }
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_safe_identifiers_validate(value in "[A-Za-z0-9_%&-]{1,250}") {
            prop_assert!(Validator::default().validate_identifier(&value).is_ok());
        }

        #[test]
        fn prop_colon_never_validates(prefix in "[a-z]{0,10}", suffix in "[a-z]{0,10}") {
            let value = format!("{prefix}:{suffix}");
            prop_assert!(Validator::default().validate_identifier(&value).is_err());
        }
    }
}
