//! Step segmentation of instruction text.

use std::sync::LazyLock;

use regex::Regex;

static STEP_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bStep\s*(\d+)\b").expect("valid regex"));

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\n\r]+").expect("valid regex"));

/// Text between one `Step N` marker and the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBlock {
    /// Marker text as written, e.g. `Step 3`.
    pub marker: String,
    /// Qualifying lines, in order. Never empty.
    pub lines: Vec<String>,
}

/// Result of segmenting a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segmentation {
    /// The document carries step markers.
    Steps(Vec<StepBlock>),
    /// No markers: every qualifying line stands alone.
    Lines(Vec<String>),
}

impl Segmentation {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Steps(blocks) => blocks.is_empty(),
            Self::Lines(lines) => lines.is_empty(),
        }
    }
}

/// Split `text` into step blocks, or into lines when it has no markers.
///
/// Text before the first marker is discarded. Blocks without a qualifying
/// line are dropped.
pub fn segment(text: &str, min_line_len: usize) -> Segmentation {
    let markers: Vec<_> = STEP_MARKER_RE.find_iter(text).collect();
    if markers.is_empty() {
        return Segmentation::Lines(qualifying_lines(text, min_line_len));
    }

    let blocks = markers
        .iter()
        .enumerate()
        .filter_map(|(i, marker)| {
            let end = markers.get(i + 1).map_or(text.len(), |next| next.start());
            let lines = qualifying_lines(&text[marker.end()..end], min_line_len);
            (!lines.is_empty()).then(|| StepBlock {
                marker: marker.as_str().to_string(),
                lines,
            })
        })
        .collect();

    Segmentation::Steps(blocks)
}

/// Trimmed lines of at least `min_len` characters.
pub fn qualifying_lines(text: &str, min_len: usize) -> Vec<String> {
    LINE_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|line| line.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}
