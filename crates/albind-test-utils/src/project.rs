//! Project directory fixtures
//!
//! Scaffolds a temporary project with a packaging directory and handler file,
//! matching what `init` expects to find on disk.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway project directory with a `dist/index.js` artifact
pub struct FakeProject {
    dir: TempDir,
}

impl FakeProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("creating temp project dir");
        let dist = dir.path().join("dist");
        fs::create_dir(&dist).expect("creating packaging dir");
        fs::write(
            dist.join("index.js"),
            "exports.handler = async () => ({ statusCode: 200 });\n",
        )
        .expect("writing handler");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Overwrite the handler so the next packed archive differs.
    pub fn touch_handler(&self, body: &str) {
        fs::write(self.path().join("dist").join("index.js"), body).expect("rewriting handler");
    }
}

impl Default for FakeProject {
    fn default() -> Self {
        Self::new()
    }
}
