//! Paragraph-aligned document chunking.
//!
//! Large documents are split into chunks that fit the remote model's context
//! budget. Chunks never split a paragraph: a paragraph longer than the limit is
//! emitted on its own, oversized.

use std::sync::LazyLock;

use regex::Regex;

/// Default chunk budget, in characters (Unicode scalar values).
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 12_000;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("paragraph break pattern is valid"));

/// A contiguous slice of a document.
///
/// `separator` is the paragraph break that followed the chunk in the source
/// text (empty for the last chunk), so [`reassemble`] can restore the original
/// document byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub text: &'a str,
    pub separator: &'a str,
}

impl Chunk<'_> {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split `text` into paragraph-aligned chunks of at most `max_chars` characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk<'_>> {
    if text.chars().count() <= max_chars {
        return vec![Chunk {
            index: 0,
            text,
            separator: "",
        }];
    }

    // Paragraph spans (byte ranges); the gaps between them are the breaks.
    let mut paragraphs: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0;
    for m in PARAGRAPH_BREAK.find_iter(text) {
        paragraphs.push((cursor, m.start()));
        cursor = m.end();
    }
    paragraphs.push((cursor, text.len()));

    let mut chunks: Vec<Chunk<'_>> = Vec::new();
    let (mut start, mut end) = paragraphs[0];
    let mut len = text[start..end].chars().count();

    for &(para_start, para_end) in &paragraphs[1..] {
        // Break plus paragraph, as they would appear if appended.
        let added = text[end..para_end].chars().count();

        // An empty running chunk (leading break) is never emitted; the break
        // stays attached to the following paragraph instead.
        if len + added > max_chars && start < end {
            chunks.push(Chunk {
                index: chunks.len(),
                text: &text[start..end],
                separator: &text[end..para_start],
            });
            start = para_start;
            len = text[para_start..para_end].chars().count();
        } else {
            len += added;
        }
        end = para_end;
    }

    // A trailing break leaves an empty final paragraph; it is already covered
    // by the previous chunk's separator.
    if start < end {
        chunks.push(Chunk {
            index: chunks.len(),
            text: &text[start..end],
            separator: "",
        });
    }

    chunks
}

/// Concatenate chunks with their separators, restoring the source text.
pub fn reassemble(chunks: &[Chunk<'_>]) -> String {
    let mut out = String::with_capacity(chunks.iter().map(|c| c.text.len() + c.separator.len()).sum());
    for chunk in chunks {
        out.push_str(chunk.text);
        out.push_str(chunk.separator);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn paragraphs(count: usize, len: usize) -> String {
        (0..count)
            .map(|i| {
                let c = (b'a' + (i % 26) as u8) as char;
                std::iter::repeat_n(c, len).collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn short_text_is_single_chunk() {
        let text = "Clause 1.\n\nClause 2.";
        let chunks = chunk_text(text, DEFAULT_MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].separator, "");
    }

    #[test]
    fn thirty_thousand_chars_split_into_three_paragraph_aligned_chunks() {
        // 15 paragraphs of 1998 chars + 14 breaks = 29,998 chars.
        let text = paragraphs(15, 1998);
        assert!(text.chars().count() > 29_000);

        let chunks = chunk_text(&text, 12_000);
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.char_len() <= 12_000);
            assert!(!chunk.text.starts_with('\n') && !chunk.text.ends_with('\n'));
            if i + 1 < chunks.len() {
                assert_eq!(chunk.separator, "\n\n");
            }
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn oversized_paragraph_is_not_split() {
        let big = "x".repeat(50);
        let text = format!("small\n\n{big}\n\ntail");
        let chunks = chunk_text(&text, 20);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["small", big.as_str(), "tail"]);
    }

    #[test]
    fn long_breaks_are_preserved() {
        let text = format!("{}\n\n\n\n{}", "a".repeat(10), "b".repeat(10));
        let chunks = chunk_text(&text, 12);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].separator, "\n\n\n\n");
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn leading_and_trailing_breaks_never_yield_empty_chunks() {
        let text = format!("\n\n{}\n\n{}\n\n", "a".repeat(10), "b".repeat(10));
        let chunks = chunk_text(&text, 12);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        // 10 two-byte characters fit a 10-character budget.
        let text = "é".repeat(10);
        assert_eq!(chunk_text(&text, 10).len(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: concatenating chunks with their separators restores the input.
        #[test]
        fn chunks_reassemble_to_input(
            text in "([a-zé ]{0,40}\n{0,4}){0,30}",
            max in 1usize..120
        ) {
            let chunks = chunk_text(&text, max);
            prop_assert_eq!(reassemble(&chunks), text);
        }

        /// Property: inputs within the limit come back as exactly one identical chunk.
        #[test]
        fn short_input_is_identity(text in "[a-z\n ]{0,200}") {
            let chunks = chunk_text(&text, 200);
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(chunks[0].text, text.as_str());
        }

        /// Property: only single-paragraph chunks may exceed the limit, and every
        /// boundary between chunks is a paragraph break.
        #[test]
        fn chunks_respect_limit_and_boundaries(
            text in "([a-z ]{1,40}\n{1,3}){1,30}",
            max in 5usize..150
        ) {
            let chunks = chunk_text(&text, max);
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert!(!chunk.text.is_empty());
                if chunk.char_len() > max {
                    prop_assert!(!chunk.text.trim_matches('\n').contains("\n\n"));
                }
                if i + 1 < chunks.len() {
                    prop_assert!(chunk.separator.len() >= 2);
                    prop_assert!(chunk.separator.chars().all(|c| c == '\n'));
                }
            }
        }
    }
}
