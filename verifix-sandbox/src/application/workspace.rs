//! Scoped working area mounted into each tool container

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

/// Name of the helper-bundle directory inside the working area
pub const BIN_DIR_NAME: &str = "bin";

/// Temporary directory holding the source snapshot and helper bundle.
///
/// Removed from disk when dropped, whichever way execution ends.
#[derive(Debug)]
pub struct WorkArea {
    dir: TempDir,
    source_path: PathBuf,
}

impl WorkArea {
    /// Materialize `source` as `source_filename` and copy `bundle` into `bin/`.
    ///
    /// An empty `bin/` is always created so templates referencing `$BIN`
    /// resolve to an existing directory.
    pub fn create(source: &str, source_filename: &str, bundle: Option<&Path>) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("verifix-").tempdir()?;
        let source_path = dir.path().join(source_filename);
        fs::write(&source_path, source)?;

        let bin_dir = dir.path().join(BIN_DIR_NAME);
        match bundle {
            Some(bundle) if bundle.is_dir() => {
                copy_dir(bundle, &bin_dir)?;
                debug!(bundle = %bundle.display(), "Copied helper bundle");
            }
            Some(bundle) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("helper bundle {} is not a directory", bundle.display()),
                ));
            }
            None => fs::create_dir(&bin_dir)?,
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // containers may run under a different uid than ours
            fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o777))?;
        }

        Ok(Self { dir, source_path })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn bin_path(&self) -> PathBuf {
        self.dir.path().join(BIN_DIR_NAME)
    }
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            make_executable(&target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_source_and_empty_bin() {
        let area = WorkArea::create("contract A {}", "contract.sol", None).unwrap();
        assert_eq!(
            fs::read_to_string(area.source_path()).unwrap(),
            "contract A {}"
        );
        assert!(area.bin_path().is_dir());
        assert_eq!(fs::read_dir(area.bin_path()).unwrap().count(), 0);
    }

    #[test]
    fn test_copies_bundle_recursively() {
        let bundle = tempfile::tempdir().unwrap();
        fs::write(bundle.path().join("run.sh"), "#!/bin/sh\necho ok\n").unwrap();
        fs::create_dir(bundle.path().join("lib")).unwrap();
        fs::write(bundle.path().join("lib/helper.py"), "print(1)").unwrap();

        let area = WorkArea::create("x", "contract.sol", Some(bundle.path())).unwrap();
        assert!(area.bin_path().join("run.sh").is_file());
        assert!(area.bin_path().join("lib/helper.py").is_file());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(area.bin_path().join("run.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_missing_bundle_is_an_error() {
        let err = WorkArea::create("x", "contract.sol", Some(Path::new("/nonexistent/bundle")))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_directory_removed_on_drop() {
        let area = WorkArea::create("x", "contract.sol", None).unwrap();
        let path = area.path().to_path_buf();
        assert!(path.exists());
        drop(area);
        assert!(!path.exists());
    }
}
