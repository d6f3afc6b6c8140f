//! Style sheet loading.
//!
//! The style sheet grammar lives outside this crate. The render model only
//! forwards style sheet text to a [`StyleSheetLoader`].

use crate::error::Result;

/// Receives style sheet text set on the graph.
pub trait StyleSheetLoader {
    /// Load (and merge) a style sheet given as text or as a `url(...)` reference.
    fn load(&mut self, source: &str) -> Result<()>;

    /// Drop every loaded rule.
    fn clear(&mut self);
}

/// Loader that keeps the raw text without interpreting it.
#[derive(Debug, Default, Clone)]
pub struct RawStyleSheet {
    sources: Vec<String>,
}

impl RawStyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every source loaded since the last clear, in load order.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// The loaded text, concatenated.
    pub fn text(&self) -> String {
        self.sources.join("\n")
    }
}

impl StyleSheetLoader for RawStyleSheet {
    fn load(&mut self, source: &str) -> Result<()> {
        self.sources.push(source.to_string());
        Ok(())
    }

    fn clear(&mut self) {
        self.sources.clear();
    }
}
