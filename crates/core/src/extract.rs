//! Ticket payload recognition inside free-form assistant text.
//!
//! The payload is not a discrete message: it is a substring that arrives
//! progressively, its boundaries split across arbitrarily many stream
//! chunks. The only correct strategy is to re-scan the full accumulated
//! text on every update with a pure function, instead of keeping partial
//! match state between chunks.

/// Literal token the assistant emits right before the payload fence.
pub const TICKET_MARKER: &str = "TICKET_PAYLOAD";

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Scans accumulated assistant text for a settled ticket candidate.
///
/// Recognizes the first `TICKET_PAYLOAD` marker followed, with nothing but
/// whitespace in between, by a ```` ```json ```` fence, and returns the text
/// strictly between the fence delimiters. Returns `None` while the fence is
/// still open (a partial payload would not parse anyway), when no marker
/// exists, or when the first marker is not followed by a json fence at all.
///
/// Only the first marker occurrence is ever considered, so re-scanning the
/// same completed text always yields the same candidate.
pub fn extract_candidate(text: &str) -> Option<&str> {
    let marker = text.find(TICKET_MARKER)?;
    let after_marker = &text[marker + TICKET_MARKER.len()..];

    let open = after_marker.find(FENCE_OPEN)?;
    if !after_marker[..open].chars().all(char::is_whitespace) {
        return None;
    }

    let body = &after_marker[open + FENCE_OPEN.len()..];
    let close = body.find(FENCE_CLOSE)?;
    Some(body[..close].trim())
}
