//! Tool declarations: the embedded catalog plus an optional tools directory

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use verifix_core::config::AnalysisConfig;
use verifix_core::domain::ToolConfig;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/builtin.yaml");

/// File names probed inside each tool directory, in order
const CONFIG_FILES: [&str; 4] = ["config.yaml", "config.yml", "config.toml", "config.json"];

/// Error type for tool declaration loading
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error in {source_name}: {error}")]
    YamlParse {
        source_name: String,
        error: serde_yml::Error,
    },
    #[error("TOML parse error in {source_name}: {error}")]
    TomlParse {
        source_name: String,
        error: toml::de::Error,
    },
    #[error("JSON parse error in {source_name}: {error}")]
    JsonParse {
        source_name: String,
        error: serde_json::Error,
    },
    #[error("Alias cycle: {}", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },
}

/// One declaration as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ToolDeclaration {
    name: Option<String>,
    version: Option<String>,
    image: Option<String>,
    bin: Option<PathBuf>,
    output: Option<String>,
    solidity: SolidityMode,
    parser: Option<String>,
    benign_exit_codes: Option<BTreeSet<i32>>,
    alias: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SolidityMode {
    entrypoint: Option<String>,
    bin: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct Entry {
    declaration: ToolDeclaration,
    /// Directory `bin` is relative to; `None` for catalog entries
    base_dir: Option<PathBuf>,
}

impl Entry {
    fn to_config(&self, id: &str) -> Option<ToolConfig> {
        let decl = &self.declaration;
        let image = decl.image.as_deref().filter(|s| !s.is_empty())?;
        let command = decl.solidity.entrypoint.as_deref().filter(|s| !s.is_empty())?;

        let mut tool = ToolConfig::new(id, image, command);
        if let Some(name) = &decl.name {
            tool = tool.with_name(name.as_str());
        }
        if let Some(version) = &decl.version {
            tool = tool.with_version(version.as_str());
        }
        if let Some(bin) = decl.bin.as_ref().or(decl.solidity.bin.as_ref()) {
            tool = tool.with_bin(match &self.base_dir {
                Some(dir) => dir.join(bin),
                None => bin.clone(),
            });
        }
        if let Some(output) = &decl.output {
            tool = tool.with_output(output.as_str());
        }
        if let Some(parser) = &decl.parser {
            tool = tool.with_parser(parser.as_str());
        }
        if let Some(codes) = &decl.benign_exit_codes {
            tool = tool.with_benign_exit_codes(codes.iter().copied());
        }
        Some(tool)
    }
}

/// Immutable map of tool declarations, built once at startup
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    entries: HashMap<String, Entry>,
}

impl ToolRegistry {
    /// Registry holding only the embedded catalog
    pub fn builtin() -> Result<Self, RegistryError> {
        let catalog: BTreeMap<String, ToolDeclaration> = serde_yml::from_str(BUILTIN_CATALOG)
            .map_err(|error| RegistryError::YamlParse {
                source_name: "builtin catalog".to_string(),
                error,
            })?;
        let entries = catalog
            .into_iter()
            .map(|(id, declaration)| {
                let entry = Entry {
                    declaration,
                    base_dir: None,
                };
                (id, entry)
            })
            .collect::<HashMap<_, _>>();
        debug!(tool_count = entries.len(), "Loaded built-in tool catalog");
        Ok(Self { entries })
    }

    /// Registry for an analysis configuration: the catalog overlaid with `tools_dir`
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, RegistryError> {
        let registry = Self::builtin()?;
        match &config.tools_dir {
            Some(dir) => registry.with_tools_dir(dir),
            None => Ok(registry),
        }
    }

    /// Overlay declarations found under `dir/<id>/config.*`
    pub fn with_tools_dir(mut self, dir: &Path) -> Result<Self, RegistryError> {
        let mut loaded = 0usize;
        for entry in std::fs::read_dir(dir)? {
            let tool_dir = entry?.path();
            if !tool_dir.is_dir() {
                continue;
            }
            let Some(id) = tool_dir.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            let Some(config_path) = CONFIG_FILES
                .iter()
                .map(|name| tool_dir.join(name))
                .find(|path| path.is_file())
            else {
                debug!(tool_dir = %tool_dir.display(), "No tool declaration found, skipping");
                continue;
            };

            let declaration = read_declaration(&config_path)?;
            self.entries.insert(
                id,
                Entry {
                    declaration,
                    base_dir: Some(tool_dir),
                },
            );
            loaded += 1;
        }
        debug!(dir = %dir.display(), tool_count = loaded, "Loaded tool declarations from directory");
        Ok(self)
    }

    /// All declared ids, aliases included
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.entries.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve one id, following aliases to the canonical declaration.
    ///
    /// `Ok(None)` when the id, or an alias target, is not declared or the
    /// declaration lacks an image or entrypoint.
    pub fn resolve(&self, id: &str) -> Result<Option<ToolConfig>, RegistryError> {
        let mut chain = vec![id.to_string()];
        let mut current = id;
        loop {
            let Some(entry) = self.entries.get(current) else {
                return Ok(None);
            };
            let Some(target) = entry.declaration.alias.as_deref() else {
                let tool = entry.to_config(current);
                if tool.is_none() {
                    warn!(tool = current, "Tool declaration lacks an image or entrypoint");
                }
                return Ok(tool);
            };
            if chain.iter().any(|seen| seen == target) {
                chain.push(target.to_string());
                return Err(RegistryError::AliasCycle { chain });
            }
            chain.push(target.to_string());
            current = target;
        }
    }

    /// Resolve `tool_ids`, dropping unknown ids and running each canonical tool once
    pub fn load<S: AsRef<str>>(&self, tool_ids: &[S]) -> Result<Vec<ToolConfig>, RegistryError> {
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(tool_ids.len());
        for id in tool_ids {
            let id = id.as_ref();
            match self.resolve(id)? {
                Some(tool) if seen.insert(tool.id.clone()) => tools.push(tool),
                Some(tool) => debug!(requested = id, canonical = %tool.id, "Tool already selected"),
                None => warn!(tool = id, "Tool not found, dropping it from the run"),
            }
        }
        Ok(tools)
    }
}

fn read_declaration(path: &Path) -> Result<ToolDeclaration, RegistryError> {
    let content = std::fs::read_to_string(path)?;
    let source_name = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(&content)
            .map_err(|error| RegistryError::JsonParse { source_name, error }),
        "toml" => {
            toml::from_str(&content).map_err(|error| RegistryError::TomlParse { source_name, error })
        }
        _ => serde_yml::from_str(&content)
            .map_err(|error| RegistryError::YamlParse { source_name, error }),
    }
}
