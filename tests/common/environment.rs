use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated HOME for running the `imhelper` binary
pub struct ImhelperTestEnvironment {
    temp_dir: TempDir,
}

impl ImhelperTestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn home_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.home_dir().join(".imhelper").join("config.toml")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.home_dir().join("helper.sock")
    }

    pub fn imhelper_cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("imhelper").expect("imhelper binary not built");
        cmd.env("HOME", self.home_dir());
        cmd.env_remove("XDG_RUNTIME_DIR");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn write_config(&self, content: &str) {
        let path = self.config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

impl Default for ImhelperTestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
