pub mod check;
pub mod init;
pub mod render;

pub use check::{check, CheckArgs};
pub use init::{init, InitArgs};
pub use render::{render, RenderArgs};

use crate::config::{Config, DEFAULT_CONFIG_NAME};
use dcstruct_evaluator::{Composer, HeadlessHost};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

/// Every `.json` file below `dir`, except the config file itself
pub(crate) fn find_descriptor_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_name().map(|n| n != DEFAULT_CONFIG_NAME).unwrap_or(true)
        })
        .collect();
    files.sort();
    files
}

/// Headless host and composer set up from the config
pub(crate) fn headless_composer(config: &Config) -> (Rc<HeadlessHost>, Rc<Composer>) {
    let host = Rc::new(HeadlessHost::new());
    for name in &config.components {
        host.add_component(name);
    }
    let composer = Composer::isolated(host.clone(), config.composer.clone());
    (host, composer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_descriptor_files_skips_config_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("nested/a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{}").unwrap();

        let files = find_descriptor_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.json", "nested/a.json"]);
    }
}
