//! Rendering of Turbo Stream fragments into the live document.

use crate::error::Result;

/// Applies an HTML fragment to the page.
///
/// Rendering may fail on malformed markup; callers contain the failure.
pub trait Renderer: Send + Sync {
    fn render(&self, html: &str) -> Result<()>;
}

impl<F> Renderer for F
where
    F: Fn(&str) -> Result<()> + Send + Sync,
{
    fn render(&self, html: &str) -> Result<()> {
        self(html)
    }
}
