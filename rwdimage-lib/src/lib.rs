//! Responsive images driven by `data-rwdimage` directives.
//!
//! [`generate::rwd_images::process_html`] scans a page for elements carrying
//! the `rwdimage` class, compiles each element's directive into scoped CSS,
//! injects the stylesheet into `head` and keeps every `<img>` source in step
//! with the breakpoint that currently wins.

pub mod config;
pub mod directive;
pub mod dom;
pub mod error;
pub mod generate;
pub mod parser;
pub mod registry;
pub mod style;
pub mod sync;

pub use config::{ImageOptions, RwdConfig};
pub use error::RwdError;
pub use generate::rwd_images::{process_document, process_file, process_html, ProcessedPage};
pub use style::media::Viewport;
