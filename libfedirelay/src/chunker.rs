//! Splitting long text into a chain of size-bounded posts
//!
//! Words are packed greedily from left to right. When a word does not fit,
//! the current chunk is closed with a trailing `…` (if there is room) and the
//! rejected word opens the next chunk behind a leading `…`. Words are never
//! split: a single word longer than the limit gets a chunk of its own and is
//! the only way a chunk can exceed the limit.
//!
//! Lengths are counted in `char`s, the way Mastodon counts post length.

/// Continuation marker placed at chunk boundaries
pub const CONTINUATION: char = '…';

/// Split `text` into chunks of at most `limit` characters
///
/// Always returns at least one chunk; empty input yields a single empty
/// chunk. A `limit` of zero is treated as one.
pub fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = ChunkBuilder::fresh();

    for word in text.split(' ') {
        let word_len = word.chars().count();

        if current.accepts(word_len, limit) {
            current.push(word, word_len, limit);
            continue;
        }

        if let Some(chunk) = current.close(limit) {
            chunks.push(chunk);
        }
        current = ChunkBuilder::continuation();
        current.push(word, word_len, limit);
    }

    if let Some(chunk) = current.finish() {
        chunks.push(chunk);
    }
    if chunks.is_empty() {
        chunks.push(String::new());
    }

    chunks
}

struct ChunkBuilder {
    text: String,
    len: usize,
    words: usize,
    /// Opened because the previous chunk overflowed
    continued: bool,
}

impl ChunkBuilder {
    fn fresh() -> Self {
        Self {
            text: String::new(),
            len: 0,
            words: 0,
            continued: false,
        }
    }

    fn continuation() -> Self {
        Self {
            continued: true,
            ..Self::fresh()
        }
    }

    /// The first word is always accepted, so oversized words land alone
    fn accepts(&self, word_len: usize, limit: usize) -> bool {
        self.words == 0 || self.len + 1 + word_len <= limit
    }

    fn push(&mut self, word: &str, word_len: usize, limit: usize) {
        if self.words == 0 {
            // Blank words carry nothing worth opening a continuation with.
            if self.continued && word.trim().is_empty() {
                return;
            }
            if self.continued && 1 + word_len <= limit {
                self.text.push(CONTINUATION);
                self.len += 1;
            }
        } else {
            self.text.push(' ');
            self.len += 1;
        }

        self.text.push_str(word);
        self.len += word_len;
        self.words += 1;
    }

    /// Close a chunk that overflowed, marking it as continued
    fn close(self, limit: usize) -> Option<String> {
        let mut chunk = self.text.trim_end().to_string();
        if chunk.is_empty() {
            return None;
        }
        if chunk.chars().count() + 1 <= limit {
            chunk.push(CONTINUATION);
        }
        Some(chunk)
    }

    /// Close the last chunk
    fn finish(self) -> Option<String> {
        let chunk = self.text.trim_end().to_string();
        if chunk.is_empty() && self.continued {
            return None;
        }
        Some(chunk)
    }
}
