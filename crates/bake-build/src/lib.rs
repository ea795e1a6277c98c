//! Batch pre-rendering of Mermaid diagrams in markdown trees.
//!
//! [`Batch`] scans the input directory, renders every diagram block through a
//! [`DiagramRenderer`](bake_diagrams::DiagramRenderer) and rewrites each
//! document to reference the rendered images. Renders are cached by content,
//! so a second run over an unchanged tree writes nothing and renders nothing.
//!
//! # Example
//!
//! ```ignore
//! use bake_build::Batch;
//! use bake_config::Config;
//! use bake_diagrams::MermaidCli;
//!
//! let config = Config::load(None, None)?;
//! let renderer = MermaidCli::from_config(&config);
//! let stats = Batch::new(config, renderer).run().await?;
//! println!("{} diagrams rendered", stats.diagrams_rendered);
//! ```

mod batch;
mod document;
mod processor;
mod scan;
mod stats;
#[cfg(test)]
mod test_support;

pub use batch::{Batch, BuildError};
pub use document::{Document, FrontMatter};
pub use processor::{Artifact, DocumentError, DocumentProcessor, FileOutcome};
pub use scan::Scanner;
pub use stats::Statistics;
