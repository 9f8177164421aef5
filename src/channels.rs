//! Tracked channel lists.
//!
//! `<dir>/twitch.txt` and `<dir>/kick.txt` hold one login (Twitch) or slug
//! (Kick) per line. Blank lines and `#` comments are ignored.

use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::adapters::Platform;
use crate::error::{NotifierError, Result};

/// Parse a channel list, lower-casing and de-duplicating names in file order
pub fn parse_channel_list(contents: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    contents
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Load the tracked channels for a platform. A missing file is an empty list.
pub async fn load_channels(dir: &Path, platform: Platform) -> Result<Vec<String>> {
    let path = dir.join(format!("{}.txt", platform.as_str()));
    let contents = match tokio::fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(platform = %platform, path = %path.display(), "No channel file");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(NotifierError::storage_with_source(
                format!("Failed to read {}", path.display()),
                e,
            ))
        }
    };

    let channels = parse_channel_list(&contents);
    info!(platform = %platform, count = channels.len(), "Loaded tracked channels");
    Ok(channels)
}
