//! Structural fingerprinting for oscillation detection.
//!
//! The hash covers only the shape of a layout: the ordered list of
//! (pattern, visual context, child count) triples across top-level sections.
//! Text and attribute content never feed the digest, so two attempts that
//! rearrange copy but keep the same section structure hash identically.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Structural summary of one top-level section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutSection {
    pub pattern: String,
    pub visual_context: String,
    pub child_count: usize,
}

/// Digest an ordered list of sections.
///
/// Order-sensitive. An empty list yields the empty string, which the
/// confidence evaluator treats as "never oscillating".
pub fn hash_sections(sections: &[LayoutSection]) -> String {
    if sections.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    for section in sections {
        hasher.update(section.pattern.as_bytes());
        hasher.update(b"|");
        hasher.update(section.visual_context.as_bytes());
        hasher.update(b"|");
        hasher.update(section.child_count.to_string().as_bytes());
        hasher.update(b";");
    }
    let digest = hasher.finalize();
    // First 16 hex characters are plenty for attempt-over-attempt comparison
    format!("{digest:x}")[..16].to_string()
}

/// Extract the structural sections from a layout artifact and digest them.
///
/// Sections live in the artifact's top-level `sections` (or `patterns`)
/// array; each carries its pattern name in `_pattern`/`pattern`, its
/// context tag in `_visual_context`/`visual_context` (default `LIGHT`),
/// and its child list in `children`. Anything absent or non-object yields
/// the empty digest.
pub fn hash_artifact(artifact: &Value) -> String {
    let sections = extract_sections(artifact);
    hash_sections(&sections)
}

fn extract_sections(artifact: &Value) -> Vec<LayoutSection> {
    let list = artifact
        .get("sections")
        .or_else(|| artifact.get("patterns"))
        .and_then(Value::as_array);

    let Some(list) = list else {
        return Vec::new();
    };

    list.iter()
        .filter_map(|section| {
            let obj = section.as_object()?;
            let pattern = str_field(obj, &["_pattern", "pattern"]).unwrap_or("unknown");
            let context = str_field(obj, &["_visual_context", "visual_context"]).unwrap_or("LIGHT");
            let child_count = obj
                .get("children")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            Some(LayoutSection {
                pattern: pattern.to_string(),
                visual_context: context.to_string(),
                child_count,
            })
        })
        .collect()
}

fn str_field<'a>(obj: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_str))
}
