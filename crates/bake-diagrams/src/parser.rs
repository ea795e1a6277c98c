//! Mermaid block detection.
//!
//! A fenced block is a line `` ```mermaid ``, the diagram source, and a
//! closing `` ``` `` line. Besides finding blocks, the parser recognises the
//! output of earlier runs: an image reference to one of the document's own
//! artifacts that is followed by its retained source (directly, or inside a
//! `<details>` disclosure) belongs to that block, so it can be rendered again
//! instead of being mistaken for new content.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Fenced mermaid block. `source` excludes the fences and final newline.
const BLOCK: &str = r"^[ \t]*```mermaid[ \t]*\r?\n(?s:(?P<source>.*?))\r?\n[ \t]*```[ \t]*\r?$";

/// Image reference with the URL captured.
const IMAGE: &str = r"!\[[^\]\n]*\]\((?P<url>[^)\s]+)\)";

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("(?m){BLOCK}")).unwrap());

static INLINE_REMNANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m){IMAGE}[ \t]*\r?\n(?P<block>{BLOCK})")).unwrap()
});

static DETAILS_REMNANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?m){IMAGE}\s*<details>\s*<summary>[^<]*</summary>\s*(?P<block>{BLOCK})\s*</details>"
    ))
    .unwrap()
});

/// A fenced diagram block found in a document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// Byte range in the scanned body. Starts at the image reference when the
    /// block is the retained source of an earlier render.
    pub range: Range<usize>,
    /// The bare fenced block, fences included.
    pub fenced: String,
    /// Diagram source between the fences, untrimmed.
    pub source: String,
}

/// Locates diagram blocks in a document body.
pub trait BlockParser: Send + Sync {
    /// Every diagram block of `body` in document order.
    ///
    /// `stem` is the document file name without extension. A reference to an
    /// artifact named `<stem>-<n>.svg` or `<stem>-<n>.png` directly above a
    /// block, or above a `<details>` disclosure wrapping it, is part of the
    /// block's range. Ranges never overlap.
    fn find_blocks(&self, body: &str, stem: &str) -> Vec<DiagramBlock>;

    /// Collapse remnants of a previous run back to bare blocks.
    fn normalize(&self, body: &str, stem: &str) -> String {
        let mut out = String::with_capacity(body.len());
        let mut cursor = 0;
        for block in self.find_blocks(body, stem) {
            out.push_str(&body[cursor..block.range.start]);
            out.push_str(&block.fenced);
            cursor = block.range.end;
        }
        out.push_str(&body[cursor..]);
        out
    }
}

/// [`BlockParser`] built on regular expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexBlockParser;

impl RegexBlockParser {
    /// Create a parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BlockParser for RegexBlockParser {
    fn find_blocks(&self, body: &str, stem: &str) -> Vec<DiagramBlock> {
        // (start of the fenced block, whole remnant span)
        let remnants: Vec<(usize, Range<usize>)> = [&*DETAILS_REMNANT_RE, &*INLINE_REMNANT_RE]
            .into_iter()
            .flat_map(|re| re.captures_iter(body))
            .filter(|caps| is_artifact_url(&caps["url"], stem))
            .filter_map(|caps| Some((caps.name("block")?.start(), caps.get(0)?.range())))
            .collect();

        let mut blocks = Vec::new();
        let mut last_end = 0;
        for caps in BLOCK_RE.captures_iter(body) {
            let (Some(whole), Some(source)) = (caps.get(0), caps.name("source")) else {
                continue;
            };
            let range = remnants
                .iter()
                .find(|(block_start, span)| *block_start == whole.start() && span.start >= last_end)
                .map_or(whole.range(), |(_, span)| span.clone());

            last_end = range.end;
            blocks.push(DiagramBlock {
                range,
                fenced: whole.as_str().to_owned(),
                source: source.as_str().to_owned(),
            });
        }
        blocks
    }
}

/// Whether the file name of `url` is `<stem>-<digits>.(svg|png)`.
fn is_artifact_url(url: &str, stem: &str) -> bool {
    let file_name = url.rsplit('/').next().unwrap_or(url);
    let Some(rest) = file_name
        .strip_prefix(stem)
        .and_then(|r| r.strip_prefix('-'))
    else {
        return false;
    };
    let Some(ordinal) = rest
        .strip_suffix(".svg")
        .or_else(|| rest.strip_suffix(".png"))
    else {
        return false;
    };
    !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit())
}
