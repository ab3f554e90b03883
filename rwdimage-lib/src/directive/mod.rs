//! The responsive-image directive language.
//!
//! A directive is the value of an element's `data-rwdimage` attribute: a
//! comma-separated list of clauses, each either a plain declaration block or a
//! `(min|max)-(width|height)` test followed by a `{ ... }` block:
//!
//! ```text
//! { src: url(s.png); padding-bottom: ratio(3/4) }, (min-width: 480px) { src: url(m.png) }
//! ```
//!
//! [`parse_directive`] produces [`Clause`]s; [`compiler::compile_element`] turns
//! them into rules and the [`compiler::Breakpoint`]s used for live matching.

pub mod compiler;
mod lexer;
mod parser;

pub use compiler::{compile_element, Breakpoint, CompiledElement, Declaration, ElementRule};
pub use parser::parse_directive;

/// How pixel dimensions in conditional tests are expressed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaUnits {
    /// Tests are kept exactly as written.
    Pixels,
    /// Integer `px` dimension tests are divided by `base` and written as `em`.
    Ems { base: u32 },
}

/// One comma-separated segment of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// The test before the block, after unit conversion; `None` for a plain clause.
    pub media_test: Option<String>,
    /// The declaration text inside the braces, not yet rewritten.
    pub declarations: String,
}

impl Clause {
    pub fn is_conditional(&self) -> bool {
        self.media_test.is_some()
    }
}
