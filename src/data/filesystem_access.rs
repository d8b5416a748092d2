//! Per-user directories used by the grader: the engine cache and the configuration file.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "fruit_grade";

#[derive(Debug, Clone, Copy)]
pub enum FsAccess {
    Cache,
    Config,
}

impl FsAccess {
    fn app_dir(&self) -> anyhow::Result<PathBuf> {
        let base = match self {
            FsAccess::Cache => dirs::cache_dir(),
            FsAccess::Config => dirs::config_dir(),
        };
        let mut path = base.ok_or_else(|| anyhow::anyhow!("no {self:?} directory on this system"))?;
        path.push(APP_DIR);
        Ok(path)
    }

    /// `fruit_grade` under the cache or config directory with `subs` appended,
    /// created if missing. E.g. `~/.cache/fruit_grade/trt-cache`.
    pub fn path_with_subs(&self, subs: &[&str]) -> anyhow::Result<PathBuf> {
        let mut d = self.app_dir()?;
        d.extend(subs);
        ensure_dir(&d)?;
        Ok(d)
    }

    /// `pipeline.json` in the configuration directory, or `None` on systems
    /// without one. Nothing is created; the file itself may not exist.
    pub fn default_config_file() -> Option<PathBuf> {
        FsAccess::Config.app_dir().ok().map(|d| d.join("pipeline.json"))
    }
}

fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_file_is_only_resolved() {
        let Ok(dir) = FsAccess::Config.app_dir() else {
            assert!(FsAccess::default_config_file().is_none());
            return;
        };
        let existed = dir.exists();

        let file = FsAccess::default_config_file().unwrap();
        assert!(file.ends_with("fruit_grade/pipeline.json"));
        assert_eq!(file.parent(), Some(dir.as_path()));
        assert_eq!(dir.exists(), existed);
    }
}
