use crate::domain::error::DomainError;
use crate::domain::models::{CodeChunk, FileRecord, SymbolRecord};

/// Chunking parameters. `overlap` must be strictly smaller than
/// `max_chunk_size` or windowing would not advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    max_chunk_size: usize,
    overlap: usize,
    min_chunk_len: usize,
}

impl ChunkerConfig {
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self, DomainError> {
        if max_chunk_size == 0 {
            return Err(DomainError::invalid_input("max_chunk_size must be positive"));
        }
        if overlap >= max_chunk_size {
            return Err(DomainError::invalid_input(format!(
                "overlap ({}) must be smaller than max_chunk_size ({})",
                overlap, max_chunk_size
            )));
        }
        Ok(Self {
            max_chunk_size,
            overlap,
            min_chunk_len: 10,
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn min_chunk_len(&self) -> usize {
        self.min_chunk_len
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1200,
            overlap: 200,
            min_chunk_len: 10,
        }
    }
}

/// Splits file content into embedding-sized chunks. Pure and deterministic:
/// the same content, symbols, and config always produce the same chunks, so
/// re-runs over unchanged files yield identical chunk ids.
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

/// A contiguous char range within the file, optionally owned by a symbol.
struct Region {
    start: usize,
    end: usize,
    symbol: Option<usize>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunks one file. Symbol spans become their own regions so a chunk
    /// never straddles two top-level definitions; text between symbols is
    /// chunked as filler regions. Oversized regions are split into
    /// overlapping windows.
    pub fn chunk_file(
        &self,
        file: &FileRecord,
        content: &str,
        symbols: &[SymbolRecord],
    ) -> Vec<CodeChunk> {
        let chars: Vec<char> = content.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        // Prefix newline counts; line_of(i) for a char index is prefix[i] + 1.
        let mut newline_prefix = Vec::with_capacity(chars.len() + 1);
        newline_prefix.push(0u32);
        for (i, c) in chars.iter().enumerate() {
            let prev = newline_prefix[i];
            newline_prefix.push(if *c == '\n' { prev + 1 } else { prev });
        }
        let total_lines = newline_prefix[chars.len()] + 1;

        let line_starts = compute_line_starts(&chars);
        let outermost = outermost_symbols(symbols);
        let regions = self.build_regions(&chars, &line_starts, total_lines, symbols, &outermost);

        let mut chunks = Vec::new();
        let mut seq: u32 = 0;
        for region in regions {
            for (win_start, win_end) in self.windows(region.end - region.start) {
                let abs_start = region.start + win_start;
                let abs_end = region.start + win_end;
                let text: String = chars[abs_start..abs_end].iter().collect();
                if text.trim().len() < self.config.min_chunk_len {
                    continue;
                }

                let start_line = newline_prefix[abs_start] + 1;
                let end_line = newline_prefix[abs_end - 1] + 1;

                let mut chunk = CodeChunk::new(
                    file.repository_id().to_string(),
                    file.path().to_string(),
                    seq,
                    text,
                    start_line,
                    end_line,
                    file.language(),
                );
                if let Some(idx) = region.symbol {
                    let symbol = &symbols[idx];
                    chunk = chunk.with_symbol(symbol.id(), symbol.name());
                }
                chunks.push(chunk);
                seq += 1;
            }
        }
        chunks
    }

    /// Splits the file into symbol regions and the gaps between them, in
    /// file order.
    fn build_regions(
        &self,
        chars: &[char],
        line_starts: &[usize],
        total_lines: u32,
        symbols: &[SymbolRecord],
        outermost: &[usize],
    ) -> Vec<Region> {
        let char_len = chars.len();
        let span_start = |line: u32| -> usize {
            let line = line.clamp(1, total_lines);
            line_starts
                .get((line - 1) as usize)
                .copied()
                .unwrap_or(char_len)
        };
        let span_end = |line: u32| -> usize {
            let line = line.clamp(1, total_lines);
            if (line as usize) < line_starts.len() {
                line_starts[line as usize]
            } else {
                char_len
            }
        };

        let mut regions = Vec::new();
        let mut cursor = 0usize;
        for &idx in outermost {
            let symbol = &symbols[idx];
            let start = span_start(symbol.start_line());
            let end = span_end(symbol.end_line());
            if start < cursor || end <= start {
                continue;
            }
            if start > cursor {
                regions.push(Region {
                    start: cursor,
                    end: start,
                    symbol: None,
                });
            }
            regions.push(Region {
                start,
                end,
                symbol: Some(idx),
            });
            cursor = end;
        }
        if cursor < char_len {
            regions.push(Region {
                start: cursor,
                end: char_len,
                symbol: None,
            });
        }
        regions
    }

    /// Window offsets over a region of `len` chars. A region at most
    /// `max_chunk_size` long is one window; longer regions slide by
    /// `max_chunk_size - overlap` so consecutive windows share `overlap`
    /// chars. The final window may be shorter.
    fn windows(&self, len: usize) -> Vec<(usize, usize)> {
        if len == 0 {
            return Vec::new();
        }
        let max = self.config.max_chunk_size;
        if len <= max {
            return vec![(0, len)];
        }
        let stride = max - self.config.overlap;
        let count = (len - self.config.overlap).div_ceil(stride);
        (0..count)
            .map(|i| {
                let start = i * stride;
                (start, (start + max).min(len))
            })
            .collect()
    }
}

/// Char offsets where each line begins; index k holds the start of line k+1.
fn compute_line_starts(chars: &[char]) -> Vec<usize> {
    let mut starts = vec![0usize];
    for (i, c) in chars.iter().enumerate() {
        if *c == '\n' && i + 1 < chars.len() {
            starts.push(i + 1);
        }
    }
    starts
}

/// Indices of symbols not nested inside another symbol's span, ordered by
/// start line. Symbols sharing a start line keep the widest span first.
fn outermost_symbols(symbols: &[SymbolRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..symbols.len()).collect();
    order.sort_by(|&a, &b| {
        symbols[a]
            .start_line()
            .cmp(&symbols[b].start_line())
            .then(symbols[b].end_line().cmp(&symbols[a].end_line()))
    });

    let mut result = Vec::new();
    let mut covered_until: u32 = 0;
    for idx in order {
        let symbol = &symbols[idx];
        if symbol.start_line() > covered_until {
            result.push(idx);
            covered_until = symbol.end_line();
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Language, SymbolKind};

    fn file() -> FileRecord {
        FileRecord::new("repo-1".to_string(), "src/app.py".to_string(), "")
    }

    fn config(max: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig::new(max, overlap).unwrap()
    }

    #[test]
    fn test_config_rejects_overlap_not_smaller_than_max() {
        assert!(ChunkerConfig::new(100, 100).is_err());
        assert!(ChunkerConfig::new(100, 150).is_err());
        assert!(ChunkerConfig::new(100, 99).is_ok());
        assert!(ChunkerConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_window_formula() {
        // len 10, max 4, overlap 2: stride 2, four windows.
        let chunker = Chunker::new(config(4, 2));
        let windows = chunker.windows(10);

        assert_eq!(windows, vec![(0, 4), (2, 6), (4, 8), (6, 10)]);
    }

    #[test]
    fn test_small_region_is_single_window() {
        let chunker = Chunker::new(config(100, 20));
        assert_eq!(chunker.windows(40), vec![(0, 40)]);
        assert_eq!(chunker.windows(100), vec![(0, 100)]);
    }

    #[test]
    fn test_short_file_yields_one_chunk() {
        let content = "def handler():\n    return 42\n";
        let chunker = Chunker::new(config(1200, 200));

        let chunks = chunker.chunk_file(&file(), content, &[]);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content(), content);
        assert_eq!(chunks[0].start_line(), 1);
        assert_eq!(chunks[0].end_line(), 2);
        assert_eq!(chunks[0].seq(), 0);
    }

    #[test]
    fn test_symbol_spans_become_regions() {
        let content =
            "import os\nimport sys\n\ndef alpha():\n    return 1\n\ndef beta():\n    return 2\n";
        let symbols = vec![
            SymbolRecord::new(
                "repo-1".to_string(),
                "src/app.py".to_string(),
                "alpha".to_string(),
                SymbolKind::Function,
                4,
                5,
            ),
            SymbolRecord::new(
                "repo-1".to_string(),
                "src/app.py".to_string(),
                "beta".to_string(),
                SymbolKind::Function,
                7,
                8,
            ),
        ];
        let chunker = Chunker::new(config(1200, 200));

        let chunks = chunker.chunk_file(&file(), content, &symbols);

        // Import preamble, then one chunk per function; the blank line
        // between alpha and beta trims away.
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].symbol_name(), None);
        assert_eq!(chunks[1].symbol_name(), Some("alpha"));
        assert_eq!(chunks[2].symbol_name(), Some("beta"));
        assert!(chunks[1].content().contains("def alpha"));
        assert!(!chunks[1].content().contains("def beta"));
        assert_eq!(chunks[1].start_line(), 4);
        assert_eq!(chunks[1].end_line(), 5);
    }

    #[test]
    fn test_nested_symbols_collapse_to_outermost() {
        let symbols = vec![
            SymbolRecord::new(
                "repo-1".to_string(),
                "src/app.py".to_string(),
                "Outer".to_string(),
                SymbolKind::Class,
                1,
                10,
            ),
            SymbolRecord::new(
                "repo-1".to_string(),
                "src/app.py".to_string(),
                "method".to_string(),
                SymbolKind::Function,
                3,
                5,
            ),
        ];

        assert_eq!(outermost_symbols(&symbols), vec![0]);
    }

    #[test]
    fn test_tiny_fragments_are_skipped() {
        let content = "x\n\ndef alpha():\n    return 1\n";
        let symbols = vec![SymbolRecord::new(
            "repo-1".to_string(),
            "src/app.py".to_string(),
            "alpha".to_string(),
            SymbolKind::Function,
            3,
            4,
        )];
        let chunker = Chunker::new(config(1200, 200));

        let chunks = chunker.chunk_file(&file(), content, &symbols);

        // The "x\n\n" gap trims to one char and is dropped.
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].symbol_name(), Some("alpha"));
        assert_eq!(chunks[0].seq(), 0);
    }

    #[test]
    fn test_oversized_region_windows_share_overlap() {
        let line = "fn a() { let value = compute_something_interesting(); }\n";
        let content = line.repeat(40);
        let chunker = Chunker::new(config(400, 100));

        let chunks = chunker.chunk_file(&file(), &content, &[]);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let head: String = pair[1].content().chars().take(100).collect();
            assert!(pair[0].content().ends_with(&head));
        }
        // Sequence numbers are contiguous from zero.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.seq(), i as u32);
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let content = "def alpha():\n    return 1\n\ndef beta():\n    return 2\n";
        let chunker = Chunker::new(ChunkerConfig::default());

        let first = chunker.chunk_file(&file(), content, &[]);
        let second = chunker.chunk_file(&file(), content, &[]);

        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_content_yields_no_chunks() {
        let chunker = Chunker::new(ChunkerConfig::default());
        assert!(chunker.chunk_file(&file(), "", &[]).is_empty());
    }
}
