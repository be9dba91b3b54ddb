use crate::config::SplitterConfig;
use crate::error::{ChunkerError, Result};
use crate::types::{Chunk, Document};

/// Recursive character splitter with overlapping chunks.
///
/// Text is cut on the coarsest separator first; only pieces that are still longer than
/// `chunk_size` are cut again with the finer separators. The accepted pieces are then packed
/// greedily into chunks, each new chunk seeded with the tail of the previous one.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

/// A slice of the source text plus the separator that stood right before it
#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    joiner: &'a str,
    text: &'a str,
}

impl TextSplitter {
    /// Create a splitter, rejecting invalid configurations
    pub fn new(config: SplitterConfig) -> Result<Self> {
        config.validate().map_err(ChunkerError::invalid_config)?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Split every document, copying its metadata onto each resulting chunk
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for doc in documents {
            let texts = self.split_text(&doc.content);
            log::debug!(
                "Split document {:?} into {} chunks",
                doc.metadata.get(crate::types::SOURCE_KEY),
                texts.len()
            );
            chunks.extend(
                texts
                    .into_iter()
                    .map(|text| Chunk::new(text, doc.metadata.clone())),
            );
        }
        chunks
    }

    /// Split raw text into chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        self.split_recursive(text, &self.config.separators, "", &mut pieces);
        self.merge_pieces(&pieces)
    }

    fn split_recursive<'a>(
        &'a self,
        text: &'a str,
        separators: &'a [String],
        joiner: &'a str,
        out: &mut Vec<Piece<'a>>,
    ) {
        let Some((separator, finer)) = separators.split_first() else {
            self.split_by_size(text, joiner, out);
            return;
        };

        if separator.is_empty() {
            self.split_by_size(text, joiner, out);
            return;
        }

        for (idx, part) in text.split(separator.as_str()).enumerate() {
            let part_joiner = if idx == 0 { joiner } else { separator.as_str() };
            if char_len(part) <= self.config.chunk_size {
                out.push(Piece {
                    joiner: part_joiner,
                    text: part,
                });
            } else {
                self.split_recursive(part, finer, part_joiner, out);
            }
        }
    }

    /// Cut text into windows of exactly `chunk_size` characters (the last may be shorter)
    fn split_by_size<'a>(&self, text: &'a str, joiner: &'a str, out: &mut Vec<Piece<'a>>) {
        let size = self.config.chunk_size;
        let mut joiner = joiner;
        let mut start = 0;
        let mut count = 0;

        for (idx, _) in text.char_indices() {
            if count == size {
                out.push(Piece {
                    joiner,
                    text: &text[start..idx],
                });
                joiner = "";
                start = idx;
                count = 0;
            }
            count += 1;
        }

        out.push(Piece {
            joiner,
            text: &text[start..],
        });
    }

    fn merge_pieces(&self, pieces: &[Piece<'_>]) -> Vec<String> {
        let size = self.config.chunk_size;
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;
        let mut started = false;

        for piece in pieces {
            let piece_len = char_len(piece.text);
            let joiner_len = char_len(piece.joiner);

            if started && current_len + joiner_len + piece_len > size {
                let overlap = tail_chars(&current, self.config.chunk_overlap).to_string();
                chunks.push(std::mem::take(&mut current));
                current_len = 0;

                if !overlap.is_empty() {
                    current_len = char_len(&overlap) + joiner_len;
                    current.push_str(&overlap);
                    current.push_str(piece.joiner);
                }
            } else if started {
                current.push_str(piece.joiner);
                current_len += joiner_len;
            }

            current.push_str(piece.text);
            current_len += piece_len;
            started = true;
        }

        if started {
            chunks.push(current);
        }

        chunks.retain(|chunk| !chunk.trim().is_empty());
        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            config: SplitterConfig::default(),
        }
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it when shorter)
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
