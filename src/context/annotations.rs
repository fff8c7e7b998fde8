//! Inline `key::value` annotation extraction.
//!
//! The grammar is permissive: any key is accepted and nothing is validated.
//! Normalizing values (for example project aliases) happens downstream.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::types::Annotation;

/// A key starts at the beginning of the text, after whitespace, or after an
/// opening bracket. The value is everything up to the next whitespace or
/// closing bracket.
static ANNOTATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s\[(])([A-Za-z0-9][A-Za-z0-9_-]*)::([^\s\])]+)")
        .expect("annotation pattern is valid")
});

/// Extract every annotation in `content`, in order of appearance.
///
/// Repeated keys are all kept. Content without annotations yields an empty
/// vec.
pub fn parse(content: &str) -> Vec<Annotation> {
    ANNOTATION_RE
        .captures_iter(content)
        .map(|caps| Annotation::new(&caps[1], &caps[2]))
        .collect()
}

/// Value of the first annotation with `key`, if any.
pub fn first_value<'a>(markers: &'a [Annotation], key: &str) -> Option<&'a str> {
    markers
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}
