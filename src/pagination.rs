//! Splitting chapter text into pages.

/// One page of a paginated chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page number within the chapter.
    pub index: usize,
    /// Number of pages in the chapter.
    pub total: usize,
    /// Text shown on this page.
    pub content: String,
}

/// Splits text into pages of at most `chars_per_page` characters.
///
/// Pages break on line boundaries where possible. A single line longer than
/// a page is cut at the character limit. Empty text yields no pages.
pub fn paginate(text: &str, chars_per_page: usize) -> Vec<Page> {
    let chunks = split_into_chunks(text, chars_per_page.max(1));
    let total = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, content)| Page {
            index,
            total,
            content,
        })
        .collect()
}

fn split_into_chunks(text: &str, limit: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    if text.trim().is_empty() {
        return chunks;
    }

    for line in text.lines() {
        for piece in hard_wrap(line, limit) {
            let piece_chars = piece.chars().count();
            let needed = piece_chars + usize::from(!current.is_empty());

            if current_chars + needed > limit && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_chars = 0;
            }

            if !current.is_empty() {
                current.push('\n');
                current_chars += 1;
            }
            current.push_str(piece);
            current_chars += piece_chars;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Cuts a line into pieces of at most `limit` characters.
fn hard_wrap(line: &str, limit: usize) -> Vec<&str> {
    if line.chars().count() <= limit {
        return vec![line];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (offset, _) in line.char_indices() {
        if count == limit {
            pieces.push(&line[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&line[start..]);
    pieces
}
