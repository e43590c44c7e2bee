//! Shareable link generation

use crate::atproto::uri::{classify, ClassificationError, ParsedLocator};

/// Turns any accepted input into a canonical link on the site
#[derive(Debug, Clone)]
pub struct LinkGenerator {
    base: String,
}

impl LinkGenerator {
    pub fn new(site_url: &str) -> Self {
        Self {
            base: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn generate(&self, input: &str) -> Result<String, ClassificationError> {
        classify(input).map(|locator| self.link_for(&locator))
    }

    pub fn link_for(&self, locator: &ParsedLocator) -> String {
        format!("{}/{}", self.base, locator.path())
    }
}
