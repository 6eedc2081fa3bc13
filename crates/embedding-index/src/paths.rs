use std::path::{Path, PathBuf};

/// Directory under the project root holding all derived index state
pub const INDEX_DIR: &str = ".devagent/index";

/// Store file name within [`INDEX_DIR`]
pub const STORE_FILE: &str = "embeddings.json";

/// Manifest file name within [`INDEX_DIR`]
pub const MANIFEST_FILE: &str = "manifest.json";

/// `<project>/.devagent/index`
#[must_use]
pub fn index_dir(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(INDEX_DIR)
}

/// `<project>/.devagent/index/embeddings.json`
#[must_use]
pub fn store_path(project_root: impl AsRef<Path>) -> PathBuf {
    index_dir(project_root).join(STORE_FILE)
}

/// `<project>/.devagent/index/manifest.json`
#[must_use]
pub fn manifest_path(project_root: impl AsRef<Path>) -> PathBuf {
    index_dir(project_root).join(MANIFEST_FILE)
}
