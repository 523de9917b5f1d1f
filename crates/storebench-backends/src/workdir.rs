//! On-disk directories owned by an adapter session.

use std::path::Path;

use crate::error::Result;

/// Remove `dir` and everything below it, if it exists.
pub fn remove(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

/// Run `f`, removing `dir` when it fails.
///
/// The error of `f` is returned unchanged. A failed removal is only logged.
pub fn or_discard<T>(dir: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = f();
    if result.is_err() {
        if let Err(err) = remove(dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %err,
                "could not remove backend directory"
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_failure_discards_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sqlite");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("storebench.db"), b"partial").unwrap();

        let result: Result<()> = or_discard(&dir, || Err(Error::NotOpen("sqlite")));
        assert!(matches!(result, Err(Error::NotOpen("sqlite"))));
        assert!(!dir.exists());
    }

    #[test]
    fn test_success_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("sled");
        std::fs::create_dir_all(&dir).unwrap();

        assert_eq!(or_discard(&dir, || Ok(7)).unwrap(), 7);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_remove_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(remove(&tmp.path().join("absent")).is_ok());
    }
}
