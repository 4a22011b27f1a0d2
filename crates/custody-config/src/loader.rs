//! Loader for configurations split across several files.
//!
//! The entry file may list other files under `include`, and included files
//! may include further files. Every file contributes its top-level sections
//! to one merged table; a section may only be defined by one file.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

/// Reads a configuration and everything it includes.
pub struct ConfigLoader {
	/// Directory relative include paths are resolved against.
	base_dir: PathBuf,
	/// Canonical paths already read.
	visited: HashSet<PathBuf>,
	/// File that defined each top-level section.
	origins: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_dir: impl AsRef<Path>) -> Self {
		Self {
			base_dir: base_dir.as_ref().to_path_buf(),
			visited: HashSet::new(),
			origins: HashMap::new(),
		}
	}

	/// Loads `entry` and its includes, then validates the merged result.
	pub async fn load_config(&mut self, entry: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let mut merged = Table::new();
		let mut pending = VecDeque::from([self.locate(entry.as_ref())]);

		while let Some(path) = pending.pop_front() {
			let mut table = self.read_table(&path).await?;
			for include in take_includes(&mut table)? {
				pending.push_back(self.locate(&include));
			}
			for (section, value) in table {
				if let Some(first) = self.origins.insert(section.clone(), path.clone()) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}",
						section,
						first.display(),
						path.display()
					)));
				}
				merged.insert(section, value);
			}
		}

		let config: Config = Value::Table(merged).try_into()?;
		config.validate()?;
		Ok(config)
	}

	fn locate(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_dir.join(path)
		}
	}

	/// Reads one file, substituting environment variables.
	async fn read_table(&mut self, path: &Path) -> Result<Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot open {}: {}", path.display(), e),
			))
		})?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"{} is included more than once",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		Ok(toml::from_str(&resolve_env_vars(&content)?)?)
	}
}

/// Removes the `include` key, accepting a single path or an array of paths.
fn take_includes(table: &mut Table) -> Result<Vec<PathBuf>, ConfigError> {
	match table.remove("include") {
		None => Ok(Vec::new()),
		Some(Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				Value::String(path) => Ok(PathBuf::from(path)),
				other => Err(ConfigError::Validation(format!(
					"include entries must be strings, found {}",
					other.type_str()
				))),
			})
			.collect(),
		Some(other) => Err(ConfigError::Validation(format!(
			"include must be a string or an array of strings, found {}",
			other.type_str()
		))),
	}
}
