//! Markdown emitted in place of a rendered block.

use bake_config::SourceStyle;

use crate::consts::DIAGRAM_LANGUAGE;

/// Summary line of the `<details>` disclosure.
const DETAILS_SUMMARY: &str = "Diagram source";

/// Build the image reference replacing a diagram block.
///
/// With [`SourceStyle::Inline`] or [`SourceStyle::Details`] the trimmed source
/// is kept below the image in a form [`BlockParser::normalize`] recognises,
/// so the next run sees the original block again.
///
/// [`BlockParser::normalize`]: crate::BlockParser::normalize
#[must_use]
pub fn build_reference(alt: &str, url: &str, source: &str, style: SourceStyle) -> String {
    let image = format!("![{alt}]({url})");
    let source = source.trim();

    match style {
        SourceStyle::None => image,
        SourceStyle::Inline => format!("{image}\n```{DIAGRAM_LANGUAGE}\n{source}\n```"),
        SourceStyle::Details => format!(
            "{image}\n\n<details>\n<summary>{DETAILS_SUMMARY}</summary>\n\n```{DIAGRAM_LANGUAGE}\n{source}\n```\n\n</details>"
        ),
    }
}
