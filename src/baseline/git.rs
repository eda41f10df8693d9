use super::{BaselineError, BaselineProvider, split_lines};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Reads baselines from HEAD with the `git` executable.
#[derive(Debug, Clone)]
pub struct GitBaselineProvider {
    git_binary: PathBuf,
}

impl Default for GitBaselineProvider {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitBaselineProvider {
    pub fn new(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    fn git<I, S>(&self, dir: &Path, args: I) -> Result<Output, BaselineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(&self.git_binary)
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()?;
        Ok(output)
    }

    /// Committed bytes of `path` at HEAD
    fn head_blob(&self, path: &Path) -> Result<Vec<u8>, BaselineError> {
        let (dir, file_name) = split_path(path)?;

        let toplevel = self.git(dir, ["rev-parse", "--show-toplevel"])?;
        if !toplevel.status.success() {
            debug!(
                "No repository for {:?}: {}",
                path,
                String::from_utf8_lossy(&toplevel.stderr).trim()
            );
            return Err(BaselineError::RepositoryNotFound(path.to_path_buf()));
        }

        // `HEAD:./name` is resolved relative to the `-C` directory
        let object = format!("HEAD:./{}", file_name.to_string_lossy());
        let blob = self.git(dir, ["cat-file", "blob", object.as_str()])?;
        if !blob.status.success() {
            debug!(
                "{:?} has no committed version: {}",
                path,
                String::from_utf8_lossy(&blob.stderr).trim()
            );
            return Err(BaselineError::NotTracked(path.to_path_buf()));
        }

        Ok(blob.stdout)
    }
}

impl BaselineProvider for GitBaselineProvider {
    fn resolve(&self, path: &Path) -> Result<Vec<String>, BaselineError> {
        let bytes = self.head_blob(path)?;
        let content = String::from_utf8(bytes).map_err(|source| BaselineError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(split_lines(&content)
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

fn split_path(path: &Path) -> Result<(&Path, &OsStr), BaselineError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| BaselineError::Git(format!("{:?} does not name a file", path)))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, file_name))
}
