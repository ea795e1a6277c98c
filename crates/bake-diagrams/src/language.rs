//! Mermaid diagram kinds and alt text generation.

use std::sync::LazyLock;

use regex::Regex;

/// `title` directive anywhere in the source, including diagram front matter.
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)(?:^|\s)title[: \t]+(.+)$").unwrap());

/// Mermaid diagram types recognised for alt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramKind {
    Graph,
    Flowchart,
    Sequence,
    Class,
    State,
    EntityRelationship,
    Journey,
    Gantt,
    Pie,
    Mindmap,
    Timeline,
    GitGraph,
}

impl DiagramKind {
    /// Parse the declaration keyword opening a diagram.
    ///
    /// Accepts the `-v2` variants (`stateDiagram-v2`, `classDiagram-v2`).
    #[must_use]
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.strip_suffix("-v2").unwrap_or(keyword) {
            "graph" => Some(Self::Graph),
            "flowchart" => Some(Self::Flowchart),
            "sequenceDiagram" => Some(Self::Sequence),
            "classDiagram" => Some(Self::Class),
            "stateDiagram" => Some(Self::State),
            "erDiagram" => Some(Self::EntityRelationship),
            "journey" => Some(Self::Journey),
            "gantt" => Some(Self::Gantt),
            "pie" => Some(Self::Pie),
            "mindmap" => Some(Self::Mindmap),
            "timeline" => Some(Self::Timeline),
            "gitGraph" => Some(Self::GitGraph),
            _ => None,
        }
    }

    /// Detect the kind from the first significant line of `source`.
    ///
    /// Blank lines, `%%` comments and a leading `---` front matter block are
    /// skipped.
    #[must_use]
    pub fn detect(source: &str) -> Option<Self> {
        let lines = source.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut in_front_matter = false;

        for (i, line) in lines.enumerate() {
            if line == "---" {
                if i == 0 {
                    in_front_matter = true;
                    continue;
                }
                if in_front_matter {
                    in_front_matter = false;
                    continue;
                }
            }
            if in_front_matter || line.starts_with("%%") {
                continue;
            }
            let keyword = line
                .split(|c: char| c.is_whitespace() || c == ':' || c == ';')
                .next()
                .unwrap_or_default();
            return Self::parse(keyword);
        }
        None
    }

    /// Human-readable label used in alt text.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Graph => "Graph",
            Self::Flowchart => "Flowchart",
            Self::Sequence => "Sequence",
            Self::Class => "Class",
            Self::State => "State",
            Self::EntityRelationship => "Entity relationship",
            Self::Journey => "Journey",
            Self::Gantt => "Gantt",
            Self::Pie => "Pie",
            Self::Mindmap => "Mindmap",
            Self::Timeline => "Timeline",
            Self::GitGraph => "Git graph",
        }
    }
}

/// Label for sources whose kind is not recognised.
const FALLBACK_LABEL: &str = "Mermaid";

/// Short description of a diagram for the image reference.
///
/// `"<Kind>: <title>"` when a `title` directive is present, otherwise
/// `"<Kind> diagram"`. Square brackets are dropped so the text cannot break
/// out of `![...]`.
#[must_use]
pub fn alt_text(source: &str) -> String {
    let label = DiagramKind::detect(source).map_or(FALLBACK_LABEL, DiagramKind::label);

    let title = TITLE_RE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| sanitize(m.as_str()))
        .filter(|t| !t.is_empty());

    match title {
        Some(title) => format!("{label}: {title}"),
        None => format!("{label} diagram"),
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '[' | ']' | '\r' | '\n'))
        .collect::<String>()
        .trim()
        .trim_matches(['"', '\''])
        .trim()
        .to_owned()
}
