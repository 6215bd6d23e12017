use serde::{Deserialize, Serialize};
use serde_json::{self, Value};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{core::utils::expand_home, error::ModSyncError};

pub const DEFAULT_LOADER: &str = "fabric";
pub const DEFAULT_BACKUP_DIR: &str = "mods_backup";

// config file

/// Represents the JSON config file
///
/// Only the `mods` list is ever written back. Every other key, known or not,
/// is saved exactly as it was loaded.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub instances_dir: PathBuf,
    #[serde(default)]
    pub is_server: bool,
    pub instances: BTreeMap<String, Instance>,
    #[serde(default)]
    pub mods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    ///The document as it was loaded
    #[serde(skip)]
    raw: Value,
    ///Path to the file to read & write
    #[serde(skip)]
    path: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub instance_dir: PathBuf,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_server: Option<bool>,
}

/// Command line values that take precedence over the instance's own
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub game_version: Option<String>,
    pub loader: Option<String>,
}

/// An instance with all of its directories worked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstance {
    pub name: String,
    pub game_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub game_version: String,
    pub loader: String,
}

impl Config {
    /// Load and parse the config file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModSyncError> {
        let path = path.as_ref();
        if !path.try_exists()? {
            return Err(ModSyncError::MissingFile(path.to_path_buf()));
        }

        let raw: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let mut config: Config = serde_json::from_value(raw.clone())?;
        config.raw = raw;
        config.path = Some(path.to_path_buf());
        debug!(
            "Loaded config from {} with {} instance(s) and {} mod(s)",
            path.display(),
            config.instances.len(),
            config.mods.len()
        );

        Ok(config)
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    pub fn set_path(&mut self, path: impl Into<Option<PathBuf>>) {
        self.path = path.into();
    }

    /// Returns `true` if `slug` is already configured, ignoring case
    pub fn has_mod(&self, slug: impl AsRef<str>) -> bool {
        let slug = slug.as_ref().to_lowercase();
        self.mods.iter().any(|m| m.to_lowercase() == slug)
    }

    /// Appends any slugs that aren't configured yet, sorted by slug
    ///
    /// Existing entries keep their place. Returns the slugs that were added.
    pub fn add_mods(&mut self, slugs: &[impl AsRef<str>]) -> Vec<String> {
        let new = slugs
            .iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty() && !self.has_mod(s))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        self.mods.extend(new.iter().cloned());
        new
    }

    /// Renders the document that `save` would write
    pub fn to_document(&self) -> Result<Value, ModSyncError> {
        let mut doc = self.raw.clone();
        if let Value::Object(map) = &mut doc {
            map.insert("mods".into(), serde_json::to_value(&self.mods)?);
            Ok(doc)
        } else {
            Ok(serde_json::to_value(self)?)
        }
    }

    /// Saves the file using the path it was loaded from
    ///
    /// Returns an error if the path isn't set
    pub fn save(&self) -> Result<(), ModSyncError> {
        let parsed = serde_json::to_string_pretty(&self.to_document()?)?;
        if let Some(path) = &self.path {
            if let Some(p) = path.parent() {
                fs::create_dir_all(p)?;
            }

            fs::write(path, parsed)?;
            debug!("Wrote config to {}", path.display());
            Ok(())
        } else {
            Err(ModSyncError::MissingPath)
        }
    }

    /// Saves the file using the provided path
    pub fn save_with_path(&mut self, path: impl AsRef<Path>) -> Result<(), ModSyncError> {
        self.path = Some(path.as_ref().to_owned());
        self.save()
    }

    /// Instance names in the order they are offered to the user
    pub fn instance_names(&self) -> Vec<&String> {
        self.instances.keys().collect()
    }

    /// Work out the directories, game version and loader for an instance
    pub fn resolve(
        &self,
        name: impl AsRef<str>,
        overrides: &Overrides,
    ) -> Result<ResolvedInstance, ModSyncError> {
        let name = name.as_ref();
        let instance = self
            .instances
            .get(name)
            .ok_or_else(|| ModSyncError::UnknownInstance(name.into()))?;

        let root = expand_home(&self.instances_dir)?.join(&instance.instance_dir);
        let game_dir = if instance.is_server.unwrap_or(self.is_server) {
            root
        } else {
            root.join(".minecraft")
        };
        let backup_dir = game_dir.join(
            self.backup_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_BACKUP_DIR)),
        );

        Ok(ResolvedInstance {
            name: name.into(),
            mods_dir: game_dir.join("mods"),
            backup_dir,
            game_dir,
            game_version: overrides
                .game_version
                .clone()
                .unwrap_or_else(|| instance.version.clone()),
            loader: overrides
                .loader
                .clone()
                .or_else(|| instance.loader.clone())
                .unwrap_or_else(|| DEFAULT_LOADER.into()),
        })
    }
}

impl Display for ResolvedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.loader, self.game_version)
    }
}

// search

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub total_hits: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub slug: String,
    pub title: String,
    pub project_type: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub downloads: u64,
}

impl Display for SearchHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: By '{}'. Slug: {}",
            self.title, self.project_type, self.author, self.slug
        )
    }
}

impl Display for SearchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(first) = self.hits.first() else {
            return write!(f, "No results");
        };

        write!(f, "Slug: {}", first.slug)?;
        for hit in &self.hits {
            write!(f, "\n{hit}")?;
        }
        Ok(())
    }
}

// remote versions

/// The file to download for the newest matching version of a project
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LatestFile {
    pub slug: String,
    pub version_number: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

impl LatestFile {
    pub fn file_size_string(&self) -> String {
        if self.size / 1_000_000 >= 1 {
            let size = self.size as f64 / 1_048_576f64;

            format!("{size:.2} MB")
        } else {
            let size = self.size as f64 / 1024f64;
            format!("{size:.2} KB")
        }
    }
}

// local mods

/// The parts of a jar's `fabric.mod.json` we care about
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FabricModJson {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A jar found in an instance's mods folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMod {
    pub path: PathBuf,
    pub filename: String,
    pub meta: Option<FabricModJson>,
}

impl Display for LocalMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.filename)?;
        if let Some(meta) = &self.meta {
            write!(
                f,
                " ({} {})",
                meta.name.as_deref().unwrap_or(&meta.id),
                meta.version
            )?;
        }
        Ok(())
    }
}

// diff

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModStatus {
    UpToDate,
    UpdateAvailable,
    MissingLocally,
    NotFoundRemotely,
}

impl ModStatus {
    pub fn needs_download(&self) -> bool {
        matches!(self, Self::UpdateAvailable | Self::MissingLocally)
    }
}

/// How a single configured mod compares to Modrinth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModReport {
    pub slug: String,
    pub status: ModStatus,
    pub current: Option<LocalMod>,
    pub latest: Option<LatestFile>,
}

impl Display for ModReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.as_ref().map(|c| c.filename.as_str());
        let latest = self.latest.as_ref().map(|l| l.filename.as_str());
        match (self.status, current, latest) {
            (ModStatus::UpToDate, _, Some(latest)) => {
                write!(f, "Mod {}: up to date ({latest})", self.slug)
            }
            (ModStatus::UpdateAvailable, Some(current), Some(latest)) => {
                write!(f, "Mod {}: Current: {current}; Latest: {latest}", self.slug)
            }
            (ModStatus::MissingLocally, _, Some(latest)) => {
                write!(f, "Mod {}: not installed; Latest: {latest}", self.slug)
            }
            (_, Some(current), _) => {
                write!(
                    f,
                    "Mod {}: not found on Modrinth; Current: {current}",
                    self.slug
                )
            }
            _ => write!(f, "Mod {}: not found on Modrinth", self.slug),
        }
    }
}

/// What happened to one mod during an update
#[derive(Debug)]
pub enum UpdateOutcome {
    Installed {
        slug: String,
        path: PathBuf,
        backup: Option<PathBuf>,
    },
    Failed {
        slug: String,
        error: ModSyncError,
    },
}

impl UpdateOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }
}

impl Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installed {
                slug,
                path,
                backup: Some(backup),
            } => write!(
                f,
                "Updated {slug} to {} (old file moved to {})",
                path.display(),
                backup.display()
            ),
            Self::Installed { slug, path, .. } => {
                write!(f, "Installed {slug} to {}", path.display())
            }
            Self::Failed { slug, error } => write!(f, "ERROR: failed to update {slug}: {error}"),
        }
    }
}
