use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the checkpoint directory.
pub const CHECKPOINT_DIR_ENV: &str = "DOCI_CHECKPOINT_DIR";

/// Directory receiving the periodic dumps of a long optimization.
///
/// Failing to write a checkpoint never aborts the optimization; it is logged
/// and the run goes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoints {
    dir: PathBuf,
}

impl Checkpoints {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Checkpoints { dir: dir.into() }
    }

    /// The directory from [`CHECKPOINT_DIR_ENV`] if set, else `configured`.
    /// `None` disables the dumps.
    pub fn resolve(configured: Option<&str>) -> Option<Self> {
        Self::choose(std::env::var(CHECKPOINT_DIR_ENV).ok(), configured)
    }

    fn choose(from_env: Option<String>, configured: Option<&str>) -> Option<Self> {
        from_env
            .filter(|dir| !dir.is_empty())
            .or_else(|| configured.filter(|dir| !dir.is_empty()).map(String::from))
            .map(Checkpoints::new)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Run `save` on the checkpoint file `name`, downgrading a failure to a
    /// warning.
    pub fn save<F>(&self, name: &str, save: F)
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let path = self.path(name);
        match save(&path) {
            Ok(()) => debug!("Checkpoint written: {}", path.display()),
            Err(err) => warn!("Failed to write checkpoint {}: {:#}", path.display(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directory_disables_checkpoints() {
        assert_eq!(Checkpoints::choose(None, None), None);
        assert_eq!(Checkpoints::choose(Some(String::new()), Some("")), None);
    }

    #[test]
    fn test_environment_wins_over_config() {
        let chosen = Checkpoints::choose(Some("/scratch/env".to_string()), Some("/scratch/cfg"));
        assert_eq!(chosen, Some(Checkpoints::new("/scratch/env")));

        let chosen = Checkpoints::choose(Some(String::new()), Some("/scratch/cfg"));
        assert_eq!(chosen, Some(Checkpoints::new("/scratch/cfg")));
    }

    #[test]
    fn test_failed_save_is_not_fatal() {
        let checkpoints = Checkpoints::new("/nonexistent/doci");
        let mut called = false;
        checkpoints.save("unitary-10.bin", |path| {
            called = true;
            assert_eq!(path, Path::new("/nonexistent/doci/unitary-10.bin"));
            color_eyre::eyre::bail!("disk full")
        });
        assert!(called);
    }
}
