use crate::config::StorageSettings;
use crate::{Error, Result};

/// Split a logical storage path into a (container, subpath) pair for the
/// flexVolume plugin.
///
/// One leading `/` is stripped, the first segment names the data container
/// and the remainder (keeping its leading `/`) becomes the subpath:
/// `users/bob/data` resolves to `("users", "/bob/data")`, `users` to
/// `("users", "")`.
pub fn split_path(path: &str) -> Result<(String, String)> {
    if path.is_empty() {
        return Err(Error::InvalidPath("empty logical path".to_string()));
    }

    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let container = trimmed.split('/').next().unwrap_or("").to_string();
    let subpath = trimmed[container.len()..].to_string();

    Ok((container, subpath))
}

/// Expand a leading `~/` into the home root before resolution.
///
/// The root is `settings.home_path` when configured, otherwise
/// `users/<username>`. Paths without the prefix pass through unchanged.
pub fn expand_home(path: &str, settings: &StorageSettings) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let root = if settings.home_path.is_empty() {
                format!("users/{}", settings.username)
            } else {
                settings.home_path.trim_end_matches('/').to_string()
            };
            format!("{}/{}", root, rest)
        }
        None => path.to_string(),
    }
}
