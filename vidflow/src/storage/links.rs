//! Flat JSON store of `{description, url}` links collected from users.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::Result;
use crate::utils::{fs, json};

/// A link the user supplied for a description the AI asked about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub description: String,
    pub url: String,
}

/// JSON-array file of every link ever collected.
#[derive(Debug, Clone)]
pub struct LinksStorage {
    path: PathBuf,
}

impl LinksStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All stored links. Missing or malformed files read as empty.
    pub async fn load(&self) -> Result<Vec<Link>> {
        Ok(match fs::read_optional(&self.path).await? {
            Some(raw) => json::parse_or_default(&raw, &self.path, "links file"),
            None => Vec::new(),
        })
    }

    /// Append links and rewrite the file.
    pub async fn append(&self, links: &[Link]) -> Result<()> {
        if links.is_empty() {
            return Ok(());
        }
        let mut all = self.load().await?;
        all.extend_from_slice(links);

        fs::ensure_parent_dir(&self.path).await?;
        let json = serde_json::to_vec_pretty(&all)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| fs::io_error("writing links", &self.path, e))?;

        info!(path = %self.path.display(), added = links.len(), total = all.len(), "Stored links");
        Ok(())
    }
}
