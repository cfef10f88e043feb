//! Project configuration: the thin YAML-backed reader that turns a
//! `pythinfer.yaml` file into a `ProjectConfig`, plus upward-directory
//! discovery of that file. Kept separate from the pipeline orchestrator
//! (`pipeline.rs`): pure data here, orchestration there.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::driver::DEFAULT_BOUND;
use crate::merger::CategorizedFile;
use crate::options::Category;

pub const PROJECT_FILE_NAME: &str = "pythinfer.yaml";

/// Maximum number of parent directories walked during upward discovery
/// before giving up.
pub const MAX_DISCOVERY_ANCESTORS: usize = 10;

fn default_bound() -> usize {
    DEFAULT_BOUND
}

fn default_output_folder() -> String {
    "derived".to_string()
}

/// `data.local` / `data.reference`: each a list of file paths or glob
/// patterns, resolved against `base_folder`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    #[serde(default)]
    pub local: Vec<String>,
    #[serde(default)]
    pub reference: Vec<String>,
}

/// `heuristics.sparql` / `heuristics.python`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HeuristicsSection {
    #[serde(default)]
    pub sparql: Vec<String>,
    #[serde(default)]
    pub python: Vec<String>,
}

/// `output.folder` / `output.extra_formats`. Formats are
/// kept as strings here (not `oxigraph::io::RdfFormat`) so the config layer
/// has no `oxigraph` parsing dependency; the pipeline resolves them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    #[serde(default = "default_output_folder")]
    pub folder: String,
    #[serde(default)]
    pub extra_formats: Vec<String>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            folder: default_output_folder(),
            extra_formats: Vec::new(),
        }
    }
}

/// `iteration.bound` (default 16).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationSection {
    #[serde(default = "default_bound")]
    pub bound: usize,
}

impl Default for IterationSection {
    fn default() -> Self {
        Self {
            bound: default_bound(),
        }
    }
}

/// The structured value the project loader hands the core. Fields
/// match the YAML layout exactly; `base_folder` defaults to the directory holding
/// the config file when not given explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub base_folder: Option<PathBuf>,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub heuristics: HeuristicsSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub iteration: IterationSection,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            base_folder: None,
            data: DataSection::default(),
            heuristics: HeuristicsSection::default(),
            output: OutputSection::default(),
            iteration: IterationSection::default(),
        }
    }
}

impl ProjectConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading project config at {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing project config at {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Root for relative-path resolution: `base_folder` if set, otherwise
    /// the directory containing `config_path`.
    pub fn resolved_base_folder(&self, config_path: &Path) -> PathBuf {
        match &self.base_folder {
            Some(base) if base.is_absolute() => base.clone(),
            Some(base) => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(base),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
        }
    }

    pub fn resolved_output_folder(&self, config_path: &Path) -> PathBuf {
        let output = Path::new(&self.output.folder);
        if output.is_absolute() {
            output.to_path_buf()
        } else {
            self.resolved_base_folder(config_path).join(output)
        }
    }

    /// Expands `data.local`/`data.reference` patterns (literal paths or glob
    /// patterns) against the base folder into a concrete categorized file
    /// list, walking the base folder once and matching entries against a
    /// compiled glob set per category.
    pub fn resolve_files(&self, config_path: &Path) -> Result<Vec<CategorizedFile>> {
        let base = self.resolved_base_folder(config_path);
        let mut files = Vec::new();
        files.extend(resolve_patterns(&base, &self.data.local, Category::Local)?);
        files.extend(resolve_patterns(
            &base,
            &self.data.reference,
            Category::Reference,
        )?);
        Ok(files)
    }
}

fn resolve_patterns(
    base: &Path,
    patterns: &[String],
    category: Category,
) -> Result<Vec<CategorizedFile>> {
    let mut literal_paths = Vec::new();
    let mut glob_builder = GlobSetBuilder::new();
    let mut has_globs = false;

    for pattern in patterns {
        let candidate = base.join(pattern);
        if candidate.is_file() {
            literal_paths.push(candidate);
            continue;
        }
        has_globs = true;
        glob_builder.add(Glob::new(pattern).with_context(|| format!("invalid glob `{pattern}`"))?);
    }

    let mut files: Vec<CategorizedFile> = literal_paths
        .into_iter()
        .map(|path| CategorizedFile { path, category })
        .collect();

    if has_globs {
        let set = glob_builder.build()?;
        for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            if set.is_match(relative) || set.is_match(entry.path()) {
                files.push(CategorizedFile {
                    path: entry.path().to_path_buf(),
                    category,
                });
            }
        }
    }
    Ok(files)
}

/// Walks upward from `start_dir` looking for `pythinfer.yaml`, stopping
/// above `$HOME`, above `MAX_DISCOVERY_ANCESTORS` ancestors, or at the
/// filesystem root.
pub fn discover_project_file(start_dir: &Path) -> Option<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut current = Some(start_dir.to_path_buf());
    let mut ancestors_walked = 0;

    while let Some(dir) = current {
        let candidate = dir.join(PROJECT_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if let Some(home) = &home {
            if &dir == home {
                return None;
            }
        }
        ancestors_walked += 1;
        if ancestors_walked >= MAX_DISCOVERY_ANCESTORS {
            return None;
        }
        current = dir.parent().map(Path::to_path_buf);
    }
    None
}

pub fn discover_project_file_from_cwd() -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir()?;
    Ok(discover_project_file(&cwd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_trips_through_yaml() {
        let mut config = ProjectConfig::default();
        config.name = Some("demo".to_string());
        config.data.local.push("local/*.ttl".to_string());
        config.data.reference.push("ref/*.ttl".to_string());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROJECT_FILE_NAME);
        config.save_to_file(&path).unwrap();
        let loaded = ProjectConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn defaults_bound_and_output_folder_when_absent() {
        let yaml = "data:\n  local: []\n";
        let config: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.iteration.bound, DEFAULT_BOUND);
        assert_eq!(config.output.folder, "derived");
    }

    #[test]
    fn discovery_stops_at_home_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        // With no pythinfer.yaml anywhere under a temp dir outside $HOME,
        // discovery must give up within the ancestor bound rather than
        // walking into unrelated directories.
        assert!(discover_project_file(&nested).is_none());
    }

    #[test]
    fn discovery_finds_file_in_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let config_path = dir.path().join(PROJECT_FILE_NAME);
        let mut f = std::fs::File::create(&config_path).unwrap();
        f.write_all(b"data:\n  local: []\n").unwrap();

        let found = discover_project_file(&nested).unwrap();
        assert_eq!(found, config_path);
    }

    #[test]
    fn resolve_files_expands_glob_patterns_under_base_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("local")).unwrap();
        std::fs::write(dir.path().join("local/a.ttl"), "").unwrap();
        std::fs::write(dir.path().join("local/b.ttl"), "").unwrap();

        let mut config = ProjectConfig::default();
        config.data.local.push("local/*.ttl".to_string());
        let config_path = dir.path().join(PROJECT_FILE_NAME);
        let files = config.resolve_files(&config_path).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.category == Category::Local));
    }
}
