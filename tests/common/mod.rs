#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use card_import::{
    project::InMemoryProject,
    session::{ImportOptions, ImportSession},
};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The project described by `tests/data/project.yaml`.
pub fn fixture_project() -> InMemoryProject {
    InMemoryProject::load(&fixture_path("project.yaml")).expect("load fixture project")
}

/// Opens a UTF-8 import session over `input`.
pub fn open_session(
    input: &str,
    project: &InMemoryProject,
    options: ImportOptions,
) -> ImportSession {
    ImportSession::open(input.as_bytes(), UTF_8, project, options).expect("open session")
}

/// Builds a tab-separated table from rows of cells.
pub fn tsv(rows: &[&[&str]]) -> String {
    let mut out = rows
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
