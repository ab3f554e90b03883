use thiserror::Error;

/// Errors from processing a page.
///
/// Directive parsing and CSS compilation never fail; these cover the I/O and
/// document plumbing around them.
#[derive(Debug, Error)]
pub enum RwdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no <head> element to receive the stylesheet")]
    MissingHead,

    #[error("failed to minify stylesheet: {0}")]
    Minify(String),
}
