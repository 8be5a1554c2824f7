//! Writing generated files

use std::fs;
use std::io::Write;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use tempfile::NamedTempFile;

use crate::error::{GenError, Result};

/// Writes each file through a temp file in the target directory, then renames
/// it into place, so a reader never sees a partial file.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtomicFileWriter;

impl AtomicFileWriter {
    pub fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.persist(path, contents, None)
    }

    /// Copy `src` to `dst`, keeping the permissions of the source file
    pub fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        let contents = fs::read(src)?;
        let permissions = fs::metadata(src)?.permissions();
        self.persist(dst, &contents, Some(permissions))
    }

    fn persist(
        &self,
        path: &Path,
        contents: &[u8],
        permissions: Option<fs::Permissions>,
    ) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents)?;
        tmp.as_file().sync_all()?;
        match permissions {
            Some(permissions) => fs::set_permissions(tmp.path(), permissions)?,
            None => set_file_mode(tmp.path())?,
        }
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Create a directory and its parents as rwxr-xr-x
pub(crate) fn create_dir_all(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path) -> Result<()> {
    Ok(())
}

/// Globs protecting existing files from being regenerated
#[derive(Debug, Clone, Default)]
pub struct NoOverwritePolicy {
    patterns: Vec<Pattern>,
}

impl NoOverwritePolicy {
    pub fn new(globs: &[String]) -> Result<Self> {
        let patterns = globs
            .iter()
            .map(|g| {
                Pattern::new(g).map_err(|e| {
                    GenError::Config(format!("invalid no_overwrite_globs pattern {:?}: {}", g, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether the target must be skipped.
    ///
    /// `filename` is the rendered name relative to the output directory and
    /// `path` the file it resolves to. Files that do not exist yet are never
    /// protected.
    pub fn protects(&self, filename: &str, path: &Path) -> bool {
        if self.patterns.is_empty() || !path.exists() {
            return false;
        }
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        self.patterns
            .iter()
            .any(|p| p.matches_with(filename, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.rs");
        AtomicFileWriter.write(&path, b"struct C;").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "struct C;");
    }

    #[test]
    fn test_write_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        AtomicFileWriter.write(&path, b"first").unwrap();
        AtomicFileWriter.write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/file.rs");
        AtomicFileWriter.write(&path, b"").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o002, 0);
    }

    #[test]
    fn test_policy_only_protects_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let policy = NoOverwritePolicy::new(&["*.custom.rs".to_string()]).unwrap();
        let path = dir.path().join("users.custom.rs");

        assert!(!policy.protects("users.custom.rs", &path));
        fs::write(&path, "hand edited").unwrap();
        assert!(policy.protects("users.custom.rs", &path));

        let other = dir.path().join("users.rs");
        fs::write(&other, "").unwrap();
        assert!(!policy.protects("users.rs", &other));
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.rs");
        fs::write(&path, "").unwrap();

        let policy = NoOverwritePolicy::new(&["*.rs".to_string()]).unwrap();
        assert!(policy.protects("file.rs", &path));
        assert!(!policy.protects("nested/file.rs", &path));

        let nested = NoOverwritePolicy::new(&["nested/*.rs".to_string()]).unwrap();
        assert!(nested.protects("nested/file.rs", &path));
    }

    #[test]
    fn test_invalid_glob_is_config_error() {
        let err = NoOverwritePolicy::new(&["[".to_string()]).unwrap_err();
        assert!(matches!(err, GenError::Config(_)));
    }
}
