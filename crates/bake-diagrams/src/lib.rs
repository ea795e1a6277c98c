//! Mermaid diagram handling for bake.
//!
//! This crate covers everything between a markdown body and a rendered image:
//! - [`BlockParser`] finds ```` ```mermaid ```` blocks, including the output
//!   of earlier runs
//! - [`ContentKey`] identifies one rendered variant for the render cache
//! - [`DiagramRenderer`] renders a source to a file, [`MermaidCli`] via `mmdc`
//! - [`alt_text`] and [`build_reference`] produce the replacement markdown
//!
//! # Example
//!
//! ```ignore
//! use bake_config::{SourceStyle, Theme};
//! use bake_diagrams::{BlockParser, DiagramRenderer, MermaidCli, RegexBlockParser};
//!
//! let parser = RegexBlockParser::new();
//! let renderer = MermaidCli::new("npx", vec!["mmdc".to_owned()]);
//!
//! for block in parser.find_blocks(body, "article") {
//!     let path = renderer.render(&block.source, "out/article-0.svg".as_ref(), Theme::Dark).await?;
//! }
//! ```

mod consts;
mod key;
mod language;
mod parser;
mod reference;
mod renderer;

pub use consts::{DEFAULT_TIMEOUT, DIAGRAM_LANGUAGE};
pub use key::ContentKey;
pub use language::{DiagramKind, alt_text};
pub use parser::{BlockParser, DiagramBlock, RegexBlockParser};
pub use reference::build_reference;
pub use renderer::{DiagramRenderer, MermaidCli, RenderError};
