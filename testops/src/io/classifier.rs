//! Filesystem probes that decide which ecosystems a project uses.
//!
//! Every probe is recomputed on each call because the tree may change between
//! tool invocations. Probes are independent booleans; callers compose them.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::core::types::{PackageManagerKind, ProjectKind};

const NODE_MANIFEST: &str = "package.json";
const TS_CONFIG: &str = "tsconfig.json";
const TS_SOURCE_DIRS: [&str; 4] = ["app", "src", "lib", "tests"];
const TS_EXTENSIONS: [&str; 2] = ["ts", "tsx"];
const PYTHON_MARKERS: [&str; 4] = [
    "pyproject.toml",
    "pytest.ini",
    "requirements.txt",
    "requirements-dev.txt",
];
const PYTHON_EXTENSION: &str = "py";

/// `package.json` at the project root.
pub fn is_script_ecosystem(root: &Path) -> bool {
    root.join(NODE_MANIFEST).exists()
}

/// `tsconfig.json` at the root, or any `.ts`/`.tsx` file under a conventional
/// source directory.
pub fn is_typed_script(root: &Path) -> bool {
    if root.join(TS_CONFIG).exists() {
        return true;
    }
    TS_SOURCE_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .filter(|dir| dir.is_dir())
        .any(|dir| contains_extension(&dir, &TS_EXTENSIONS))
}

/// A Python marker file at the root, or any `.py` file anywhere under it.
pub fn is_interpreted_scripting(root: &Path) -> bool {
    if PYTHON_MARKERS
        .iter()
        .any(|marker| root.join(marker).exists())
    {
        return true;
    }
    contains_extension(root, &[PYTHON_EXTENSION])
}

/// Lockfile-driven package manager choice; defaults to npm.
pub fn package_manager(root: &Path) -> PackageManagerKind {
    if root.join("pnpm-lock.yaml").exists() {
        PackageManagerKind::Pnpm
    } else if root.join("yarn.lock").exists() {
        PackageManagerKind::Yarn
    } else {
        PackageManagerKind::Npm
    }
}

/// Snapshot of every probe taken at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProjectProbe {
    pub script_ecosystem: bool,
    pub typed_script: bool,
    pub interpreted_scripting: bool,
    pub package_manager: PackageManagerKind,
}

impl ProjectProbe {
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn scan(root: &Path) -> Self {
        let probe = Self {
            script_ecosystem: is_script_ecosystem(root),
            typed_script: is_typed_script(root),
            interpreted_scripting: is_interpreted_scripting(root),
            package_manager: package_manager(root),
        };
        debug!(?probe, "project probed");
        probe
    }

    /// Single summary label. Typed-script requires the Node manifest as well.
    pub fn kind(&self) -> ProjectKind {
        if self.typed_script && self.script_ecosystem {
            ProjectKind::TypedScriptEcosystem
        } else if self.script_ecosystem {
            ProjectKind::ScriptEcosystem
        } else if self.interpreted_scripting {
            ProjectKind::InterpretedScripting
        } else {
            ProjectKind::Unknown
        }
    }
}

/// Summary classification of the tree at `root`.
pub fn classify(root: &Path) -> ProjectKind {
    ProjectProbe::scan(root).kind()
}

fn contains_extension(dir: &Path, extensions: &[&str]) -> bool {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
}
