//! On-disk workspace fixtures

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;
use tower_lsp::lsp_types::Url;

/// A temporary workspace of manifest files
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn root_uri(&self) -> Url {
        Url::from_directory_path(self.root()).unwrap()
    }

    pub fn uri(&self, name: &str) -> Url {
        Url::from_file_path(self.root().join(name)).unwrap()
    }
}

/// Rules shipped with the repository
pub fn default_rules_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("rules")
}

/// `initializationOptions` pointing at the shipped rules
pub fn initialization_options() -> Value {
    json!({ "rulesDir": default_rules_dir() })
}
