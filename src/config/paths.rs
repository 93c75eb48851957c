use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "config.json";

pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "sieve-syntax").map(|d| d.config_dir().to_path_buf())
}
