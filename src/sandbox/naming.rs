//! Container name generation.

use crate::config::CONTAINER_NAME_PREFIX;

/// Session ID characters kept in the name suffix.
const ID_LEN: usize = 8;

/// Longest title fragment kept in a name.
const MAX_TITLE_LEN: usize = 30;

/// Build a container name from a session ID and a human-readable title.
///
/// Format: `agent-deck-{title}-{id8}`. The 8-char ID suffix makes the name
/// unique; the title only helps humans reading `docker ps`. An empty
/// sanitized title yields `agent-deck-{id8}`.
#[must_use]
pub fn generate_name(session_id: &str, title: &str) -> String {
    let id: String = session_id.chars().take(ID_LEN).collect();
    let sanitized = sanitize_container_name(title);
    if sanitized.is_empty() {
        format!("{CONTAINER_NAME_PREFIX}{id}")
    } else {
        format!("{CONTAINER_NAME_PREFIX}{sanitized}-{id}")
    }
}

/// Reduce a title to Docker's name alphabet `[A-Za-z0-9_.-]`.
///
/// Spaces become hyphens, everything else outside the alphabet is dropped.
/// Docker rejects leading/trailing `-` and `.`, so those are trimmed both
/// before and after truncation.
fn sanitize_container_name(title: &str) -> String {
    let mapped: String = title
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.' | '-' => Some(c),
            ' ' => Some('-'),
            _ => None,
        })
        .collect();

    let trimmed = mapped.trim_matches(['-', '.']);
    // ASCII only at this point, byte slicing is safe
    let truncated = &trimmed[..trimmed.len().min(MAX_TITLE_LEN)];
    truncated.trim_end_matches(['-', '.']).to_string()
}

/// True if `name` follows the managed naming convention.
///
/// The bare prefix alone does not count.
#[must_use]
pub fn is_managed_container(name: &str) -> bool {
    name.len() > CONTAINER_NAME_PREFIX.len() && name.starts_with(CONTAINER_NAME_PREFIX)
}
