//! Splits long reply text into platform-legal message chunks.

/// Hard cap the platform enforces on a message body.
pub const MESSAGE_CONTENT_LIMIT: usize = 2000;

/// Chunk size used for replies. Kept under [`MESSAGE_CONTENT_LIMIT`] so an
/// edit or followup never trips the cap.
pub const REPLY_CHUNK_LIMIT: usize = 1900;

/// Split `text` into trimmed, non-empty chunks of at most `limit` characters.
///
/// Each cut prefers the latest natural boundary inside the current window:
/// a blank line, or a sentence terminator (`.`, `!`, `?`) kept with its
/// sentence. A window with neither is cut hard at `limit`, which can land
/// mid-token for oversized words. Empty or whitespace-only input yields no
/// chunks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    assert!(limit > 0, "chunk limit must be positive");

    let mut chunks = Vec::new();
    let mut rest = text;
    loop {
        let Some(window_end) = char_prefix_end(rest, limit) else {
            let tail = rest.trim();
            if !tail.is_empty() {
                chunks.push(tail.to_string());
            }
            return chunks;
        };
        let cut = break_before(&rest[..window_end]).unwrap_or(window_end);
        let head = rest[..cut].trim();
        if !head.is_empty() {
            chunks.push(head.to_string());
        }
        rest = &rest[cut..];
    }
}

/// Byte index just past the `limit`-th character, or `None` when the text
/// already fits within `limit` characters.
fn char_prefix_end(text: &str, limit: usize) -> Option<usize> {
    text.char_indices().nth(limit).map(|(idx, _)| idx)
}

/// Rightmost natural break in the window, as a cut position placed after the
/// boundary: after the second newline of a blank line, or after a sentence
/// terminator. `None` when the window contains neither.
fn break_before(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b'.' | b'!' | b'?' => return Some(i + 1),
            b'\n' if i + 1 < bytes.len() && bytes[i + 1] == b'\n' => return Some(i + 2),
            _ => {}
        }
    }
    None
}
