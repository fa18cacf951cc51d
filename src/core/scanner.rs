use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

use super::UnitOrigin;
use crate::bytecode::MODULE_DUMP_SUFFIX;
use crate::config::IndicatorSets;

const SOLUTION_EXTENSION: &str = "sln";
const PROJECT_EXTENSION: &str = "csproj";
const SOURCE_EXTENSION: &str = "cs";
const BUILD_OUTPUT_DIR: &str = "bin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub root: PathBuf,
}

impl RepositoryInfo {
    pub fn new(root: &Path) -> Self {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self {
            name,
            root: root.to_path_buf(),
        }
    }
}

/// Finds repositories and the source and compiled-module units inside them.
pub struct FileScanner {
    indicators: Arc<IndicatorSets>,
    exclude_tests: bool,
}

impl FileScanner {
    pub fn new(indicators: Arc<IndicatorSets>, exclude_tests: bool) -> Self {
        Self {
            indicators,
            exclude_tests,
        }
    }

    /// Immediate subdirectories of `root` holding a solution or project
    /// manifest anywhere below them; `root` itself if none do and it holds one.
    pub fn discover_repositories(&self, root: &Path) -> Result<Vec<RepositoryInfo>> {
        if !root.is_dir() {
            anyhow::bail!("input path is not a directory: {}", root.display());
        }

        let mut children: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir() && !is_skipped_dir_name(p))
            .collect();
        children.sort();

        let mut repositories: Vec<RepositoryInfo> = children
            .par_iter()
            .filter(|dir| contains_manifest(dir))
            .map(|dir| RepositoryInfo::new(dir))
            .collect();

        if repositories.is_empty() && contains_manifest(root) {
            repositories.push(RepositoryInfo::new(root));
        }

        Ok(repositories)
    }

    /// Source-text units of a repository, sorted by path.
    pub fn scan_sources(&self, repository: &RepositoryInfo) -> Vec<UnitOrigin> {
        let entries: Vec<DirEntry> = WalkDir::new(&repository.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !e.file_type().is_dir() || !is_build_or_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();

        let projects = ProjectIndex::build(&repository.root);

        let mut units: Vec<UnitOrigin> = entries
            .par_iter()
            .filter(|entry| has_extension(entry.path(), SOURCE_EXTENSION))
            .filter(|entry| !self.exclude_tests || !self.in_test_directory(&repository.root, entry.path()))
            .map(|entry| self.origin(repository, &projects, entry.path()))
            .collect();

        units.sort_by(|a, b| a.path.cmp(&b.path));
        units
    }

    /// Compiled-module dumps found under build-output directories, sorted by path.
    pub fn scan_modules(&self, repository: &RepositoryInfo) -> Vec<UnitOrigin> {
        let entries: Vec<DirEntry> = WalkDir::new(&repository.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !e.file_type().is_dir() || !is_hidden_or_vendor(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .collect();

        let projects = ProjectIndex::build(&repository.root);

        let mut units: Vec<UnitOrigin> = entries
            .par_iter()
            .filter(|entry| is_module_dump(entry.path()))
            .filter(|entry| under_build_output(&repository.root, entry.path()))
            .filter(|entry| !self.exclude_tests || !self.is_test_module(&repository.root, entry.path()))
            .map(|entry| self.origin(repository, &projects, entry.path()))
            .collect();

        units.sort_by(|a, b| a.path.cmp(&b.path));
        units
    }

    fn origin(&self, repository: &RepositoryInfo, projects: &ProjectIndex, path: &Path) -> UnitOrigin {
        let project = projects
            .project_for(path)
            .unwrap_or_else(|| repository.name.clone());
        UnitOrigin::new(repository.name.clone(), project, path.to_path_buf())
    }

    fn in_test_directory(&self, root: &Path, path: &Path) -> bool {
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative
            .parent()
            .map(|dir| {
                dir.components()
                    .any(|c| self.indicators.is_test_name(&c.as_os_str().to_string_lossy()))
            })
            .unwrap_or(false)
    }

    fn is_test_module(&self, root: &Path, path: &Path) -> bool {
        let stem = crate::bytecode::reader::module_name(path);
        self.indicators.is_test_name(&stem) || self.in_test_directory(root, path)
    }
}

/// Maps project directories to project names (the `.csproj` stem).
struct ProjectIndex {
    projects: HashMap<PathBuf, String>,
    root: PathBuf,
}

impl ProjectIndex {
    fn build(root: &Path) -> Self {
        let projects = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !e.file_type().is_dir() || !is_build_or_hidden(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && has_extension(e.path(), PROJECT_EXTENSION))
            .filter_map(|e| {
                let dir = e.path().parent()?.to_path_buf();
                let stem = e.path().file_stem()?.to_string_lossy().into_owned();
                Some((dir, stem))
            })
            .collect();
        Self {
            projects,
            root: root.to_path_buf(),
        }
    }

    fn project_for(&self, path: &Path) -> Option<String> {
        path.ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(&self.root))
            .find_map(|dir| self.projects.get(dir).cloned())
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn is_module_dump(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(MODULE_DUMP_SUFFIX))
        .unwrap_or(false)
}

fn under_build_output(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .any(|c| c.as_os_str() == BUILD_OUTPUT_DIR)
}

fn contains_manifest(dir: &Path) -> bool {
    WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !e.file_type().is_dir() || !is_build_or_hidden(e))
        .filter_map(|e| e.ok())
        .any(|e| {
            e.file_type().is_file()
                && (has_extension(e.path(), SOLUTION_EXTENSION) || has_extension(e.path(), PROJECT_EXTENSION))
        })
}

fn is_skipped_dir_name(path: &Path) -> bool {
    path.file_name()
        .map(|n| {
            let name = n.to_string_lossy();
            name.starts_with('.') || name == "node_modules"
        })
        .unwrap_or(false)
}

fn is_hidden_or_vendor(entry: &DirEntry) -> bool {
    entry.depth() > 0 && is_skipped_dir_name(entry.path())
}

fn is_build_or_hidden(entry: &DirEntry) -> bool {
    if is_hidden_or_vendor(entry) {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && (name == BUILD_OUTPUT_DIR || name == "obj")
}
