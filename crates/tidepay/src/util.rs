//! Small shared helpers

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;

/// Seconds since the Unix epoch
pub(crate) fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Expand a leading `~` to the user's home directory
pub(crate) fn expand_working_dir(path: &str) -> Result<PathBuf, Error> {
    if let Some(stripped) = path.strip_prefix("~") {
        let home = home::home_dir()
            .ok_or_else(|| Error::Config("could not determine home directory".to_string()))?;
        let stripped = stripped.trim_start_matches('/');
        if stripped.is_empty() {
            return Ok(home);
        }
        return Ok(home.join(stripped));
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_working_dir() {
        assert_eq!(
            expand_working_dir("/var/lib/tidepay").unwrap(),
            PathBuf::from("/var/lib/tidepay")
        );

        let home = home::home_dir().unwrap();
        assert_eq!(expand_working_dir("~").unwrap(), home);
        assert_eq!(expand_working_dir("~/.tidepay").unwrap(), home.join(".tidepay"));
    }
}
