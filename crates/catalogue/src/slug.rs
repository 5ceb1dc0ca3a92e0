//! URL-safe identifiers derived from names.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use storefront_core::{DomainError, DomainResult, ValueObject};

/// Unique, URL-safe textual identifier.
///
/// Lowercase ASCII letters, digits, `-` and `_`; never starts or ends with
/// `-`; at most [`Slug::MAX_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl ValueObject for Slug {}

impl Slug {
    pub const MAX_LEN: usize = 128;

    /// Validate an explicitly supplied slug.
    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::validation("slug cannot be empty"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(DomainError::validation(format!(
                "slug exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if let Some(bad) = value.chars().find(|c| !is_slug_char(*c)) {
            return Err(DomainError::validation(format!(
                "slug contains invalid character {bad:?}"
            )));
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(DomainError::validation("slug cannot start or end with '-'"));
        }
        Ok(Self(value))
    }

    /// Derive a slug from `name`, suffixing `-2`, `-3`, ... while `is_taken`
    /// reports a collision.
    pub fn unique_from<F>(name: &str, mut is_taken: F) -> DomainResult<Self>
    where
        F: FnMut(&Slug) -> bool,
    {
        let base = slugify(name);
        if base.is_empty() {
            return Err(DomainError::validation(format!(
                "cannot derive a slug from {name:?}"
            )));
        }

        let candidate = Slug(base.clone());
        if !is_taken(&candidate) {
            return Ok(candidate);
        }

        let mut n: u64 = 2;
        loop {
            let suffix = format!("-{n}");
            let room = Self::MAX_LEN - suffix.len();
            // `base` is ASCII so byte slicing stays on char boundaries.
            let stem = base[..base.len().min(room)].trim_end_matches('-');
            let candidate = Slug(format!("{stem}{suffix}"));
            if !is_taken(&candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Slug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::parse(value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_slug_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Turn free text into slug form.
///
/// Decomposes to NFKD and keeps only the ASCII part, so accented letters
/// lose their marks (`é` becomes `e`). Then lowercases, keeps ASCII
/// alphanumerics and `_`, collapses runs of whitespace and hyphens into one
/// `-`, drops everything else, strips `-`/`_` from both ends and truncates to
/// [`Slug::MAX_LEN`]. May return an empty string (e.g. for `"!!!"`).
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(Slug::MAX_LEN));
    let mut pending_sep = false;

    for ch in name.nfkd().filter(char::is_ascii) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' {
            pending_sep = true;
        }
    }

    let trimmed = out.trim_start_matches(['-', '_']);
    let end = trimmed.len().min(Slug::MAX_LEN);
    trimmed[..end].trim_end_matches(['-', '_']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Books"), "books");
        assert_eq!(slugify("Board Games"), "board-games");
        assert_eq!(slugify("  DVDs  &  Blu-ray  "), "dvds-blu-ray");
        assert_eq!(slugify("Kids' Toys"), "kids-toys");
    }

    #[test]
    fn slugify_strips_edge_separators() {
        assert_eq!(slugify("--_Gift Cards_--"), "gift-cards");
        assert_eq!(slugify("snake_case name"), "snake_case-name");
    }

    #[test]
    fn slugify_transliterates_accents() {
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("Ｆｕｌｌｗｉｄｔｈ ﬁle"), "fullwidth-file");
        assert_eq!(slugify("日本語"), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_truncates_to_max_len() {
        let name = "a".repeat(300);
        assert_eq!(slugify(&name).len(), Slug::MAX_LEN);
    }

    #[test]
    fn parse_rejects_invalid_slugs() {
        assert!(Slug::parse("").is_err());
        assert!(Slug::parse("Books").is_err());
        assert!(Slug::parse("-books").is_err());
        assert!(Slug::parse("books-").is_err());
        assert!(Slug::parse("books and dvds").is_err());
        assert!(Slug::parse("x".repeat(Slug::MAX_LEN + 1)).is_err());
        assert!(Slug::parse("books_2-new").is_ok());
    }

    #[test]
    fn unique_from_returns_base_when_free() {
        let slug = Slug::unique_from("Books", |_| false).unwrap();
        assert_eq!(slug.as_str(), "books");
    }

    #[test]
    fn unique_from_appends_counter_on_collision() {
        let taken: HashSet<&str> = ["books", "books-2"].into_iter().collect();
        let slug = Slug::unique_from("Books", |s| taken.contains(s.as_str())).unwrap();
        assert_eq!(slug.as_str(), "books-3");
    }

    #[test]
    fn unique_from_keeps_suffixed_slug_within_max_len() {
        let name = "b".repeat(Slug::MAX_LEN);
        let base = slugify(&name);
        let slug = Slug::unique_from(&name, |s| s.as_str() == base).unwrap();
        assert_eq!(slug.as_str().len(), Slug::MAX_LEN);
        assert!(slug.as_str().ends_with("-2"));
    }

    #[test]
    fn unique_from_rejects_names_without_slug_characters() {
        match Slug::unique_from("???", |_| false) {
            Err(DomainError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn deserialize_validates() {
        let ok: Slug = serde_json::from_str("\"toys\"").unwrap();
        assert_eq!(ok.as_str(), "toys");
        assert!(serde_json::from_str::<Slug>("\"Not A Slug\"").is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: any non-empty slugify output is a valid slug.
            #[test]
            fn slugify_output_parses(name in "\\PC{0,200}") {
                let s = slugify(&name);
                if !s.is_empty() {
                    prop_assert!(Slug::parse(s.clone()).is_ok(), "invalid slug {:?}", s);
                }
            }

            /// Property: derived slugs never collide with the taken set.
            #[test]
            fn unique_from_avoids_taken(
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
                extra in 0usize..6
            ) {
                let base = slugify(&name);
                let mut taken: HashSet<String> = HashSet::new();
                taken.insert(base.clone());
                for n in 2..(2 + extra) {
                    taken.insert(format!("{base}-{n}"));
                }
                let slug = Slug::unique_from(&name, |s| taken.contains(s.as_str())).unwrap();
                prop_assert!(!taken.contains(slug.as_str()));
                prop_assert!(slug.as_str().len() <= Slug::MAX_LEN);
            }
        }
    }
}
