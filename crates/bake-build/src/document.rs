//! Markdown documents with optional YAML front matter.

use serde_yaml::{Mapping, Value};

/// Front matter delimiter line.
const DELIMITER: &str = "---";

/// YAML header of a document.
///
/// The raw text is kept next to the parsed mapping so that writing a
/// document back never reformats its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    raw: String,
    fields: Mapping,
}

impl FrontMatter {
    /// Header text including both delimiter lines.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed metadata fields, in document order.
    #[must_use]
    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    /// `title` field, if it is a string.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

/// A document split into front matter and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Metadata header, if the document starts with one.
    pub front_matter: Option<FrontMatter>,
    /// Everything after the header.
    pub body: String,
}

impl Document {
    /// Split `content` into front matter and body.
    ///
    /// A header is recognised when the first line is `---` and a later line
    /// is `---`. Without a closing delimiter the whole content is body.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        let Some((raw, yaml, body)) = split_front_matter(content) else {
            return Ok(Self {
                front_matter: None,
                body: content.to_owned(),
            });
        };

        let fields = if yaml.trim().is_empty() {
            Mapping::new()
        } else {
            serde_yaml::from_str(yaml)?
        };

        Ok(Self {
            front_matter: Some(FrontMatter {
                raw: raw.to_owned(),
                fields,
            }),
            body: body.to_owned(),
        })
    }

    /// Document title from front matter.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.front_matter.as_ref().and_then(FrontMatter::title)
    }

    /// Serialize back to text: the untouched header, then the body.
    #[must_use]
    pub fn render(&self) -> String {
        match &self.front_matter {
            Some(fm) => format!("{}{}", fm.raw, self.body),
            None => self.body.clone(),
        }
    }
}

/// Returns `(raw header, yaml between delimiters, body)`.
fn split_front_matter(content: &str) -> Option<(&str, &str, &str)> {
    let first_end = content.find('\n')?;
    if content[..first_end].trim_end() != DELIMITER {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in content[yaml_start..].split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let end = offset + line.len();
            return Some((&content[..end], &content[yaml_start..offset], &content[end..]));
        }
        offset += line.len();
    }
    None
}
