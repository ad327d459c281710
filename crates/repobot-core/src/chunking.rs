/// Maximum characters posted in a single outbound chat message.
pub const SLACK_MESSAGE_MAX_CHARS: usize = 4_000;

/// Splits `text` into consecutive slices of at most `max_chars` characters.
///
/// Boundaries always fall between `char`s, so multi-byte characters are never
/// split. Every chunk except the last holds exactly `max_chars` characters.
/// Empty input yields no chunks. A `max_chars` of zero is treated as one.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut chunk_start = 0_usize;
    let mut chars_in_chunk = 0_usize;

    for (byte_index, ch) in text.char_indices() {
        chars_in_chunk = chars_in_chunk.saturating_add(1);
        if chars_in_chunk == max_chars {
            let chunk_end = byte_index + ch.len_utf8();
            chunks.push(&text[chunk_start..chunk_end]);
            chunk_start = chunk_end;
            chars_in_chunk = 0;
        }
    }
    if chunk_start < text.len() {
        chunks.push(&text[chunk_start..]);
    }
    chunks
}
