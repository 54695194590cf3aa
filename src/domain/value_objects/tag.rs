use crate::domain::errors::{DomainError, DomainResult};

pub const MAX_TAG_LENGTH: usize = 50;

/// Trims a tag and checks its length. Tags are otherwise kept verbatim.
pub fn normalize_tag(raw: &str) -> DomainResult<String> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err(DomainError::validation("tags", "tag must not be empty"));
    }
    if tag.chars().count() > MAX_TAG_LENGTH {
        return Err(DomainError::validation(
            "tags",
            format!("tag must be at most {} characters", MAX_TAG_LENGTH),
        ));
    }
    Ok(tag.to_string())
}
