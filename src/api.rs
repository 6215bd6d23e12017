use std::{collections::HashMap, io::Read, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};
use ureq::{Agent, AgentBuilder};

use crate::{
    error::ModSyncError,
    model::{LatestFile, SearchResponse},
};

pub const MODRINTH_API: &str = "https://api.modrinth.com/v2";
pub const USER_AGENT: &str = concat!("modsync/", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref SLUG_RE: Regex =
        Regex::new(r#"^[\w!@$()`.+,"\-']{3,64}$"#).expect("slug regex");
}

#[derive(Deserialize, Clone, Debug)]
struct ProjectVersion {
    version_number: String,
    files: Vec<VersionFile>,

    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Deserialize, Clone, Debug)]
struct VersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    size: u64,

    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

/// A response body that hasn't been read yet
pub struct Download {
    pub len: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// The read-only Modrinth endpoints this crate uses
#[cfg_attr(test, mockall::automock)]
pub trait ModrinthApi {
    /// Search for projects matching `query`
    fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, ModSyncError>;

    /// The newest file of `slug` that works with the given game version and loader
    ///
    /// Returns `None` if the project doesn't exist or has no matching versions
    fn latest_version(
        &self,
        slug: &str,
        game_version: &str,
        loader: &str,
    ) -> Result<Option<LatestFile>, ModSyncError>;

    /// Whether a project with this slug exists
    fn project_exists(&self, slug: &str) -> Result<bool, ModSyncError>;

    /// Start downloading a file
    fn download(&self, url: &str) -> Result<Download, ModSyncError>;
}

/// Blocking client for the Modrinth v2 API
#[derive(Clone, Debug)]
pub struct Modrinth {
    agent: Agent,
    base_url: String,
}

impl Default for Modrinth {
    fn default() -> Self {
        Self::new(MODRINTH_API)
    }
}

impl Modrinth {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(10))
            .build();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// GET a JSON document, mapping 404 to `None`
    fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<String>, ModSyncError> {
        let url = self.url(path);
        let mut req = self
            .agent
            .get(&url)
            .set("accept", "application/json");
        for (k, v) in query {
            req = req.query(k, v);
        }

        trace!("GET {}", req.url());
        match req.call() {
            Ok(res) => Ok(Some(res.into_string()?)),
            Err(ureq::Error::Status(404, _)) => {
                debug!("Got 404 for {}", url);
                Ok(None)
            }
            Err(ureq::Error::Status(status, _)) => Err(ModSyncError::StatusError { url, status }),
            Err(e) => Err(e.into()),
        }
    }
}

fn check_slug(slug: &str) -> Result<(), ModSyncError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(ModSyncError::InvalidSlug(slug.into()))
    }
}

fn parse<'a, T: Deserialize<'a>>(raw: &'a str) -> Result<T, ModSyncError> {
    serde_json::from_str(raw).map_err(|e| {
        debug!("Unable to parse response from Modrinth: {}", raw);
        e.into()
    })
}

impl ModrinthApi for Modrinth {
    fn search(&self, query: &str, limit: usize) -> Result<SearchResponse, ModSyncError> {
        let limit = limit.to_string();
        let raw = self
            .get_json("search", &[("query", query), ("limit", limit.as_str())])?
            .ok_or_else(|| ModSyncError::MiscError("Modrinth search endpoint not found".into()))?;

        parse(&raw)
    }

    fn latest_version(
        &self,
        slug: &str,
        game_version: &str,
        loader: &str,
    ) -> Result<Option<LatestFile>, ModSyncError> {
        check_slug(slug)?;
        let loaders = format!("[\"{loader}\"]");
        let game_versions = format!("[\"{game_version}\"]");
        let Some(raw) = self.get_json(
            &format!("project/{slug}/version"),
            &[("loaders", loaders.as_str()), ("game_versions", game_versions.as_str())],
        )?
        else {
            return Ok(None);
        };

        let versions: Vec<ProjectVersion> = parse(&raw)?;
        Ok(map_versions(slug, &versions))
    }

    fn project_exists(&self, slug: &str) -> Result<bool, ModSyncError> {
        check_slug(slug)?;
        Ok(self.get_json(&format!("project/{slug}"), &[])?.is_some())
    }

    fn download(&self, url: &str) -> Result<Download, ModSyncError> {
        let res = match self.agent.get(url).call() {
            Ok(res) => res,
            Err(ureq::Error::Status(status, _)) => {
                return Err(ModSyncError::StatusError {
                    url: url.into(),
                    status,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let len = res
            .header("Content-Length")
            .and_then(|l| l.parse::<u64>().ok());
        debug!("Downloading {} ({:?} bytes)", url, len);

        Ok(Download {
            len,
            reader: Box::new(res.into_reader()),
        })
    }
}

/// Pick the file to download from a version listing, newest first
fn map_versions(slug: &str, versions: &[ProjectVersion]) -> Option<LatestFile> {
    let latest = versions.first()?;
    let file = latest
        .files
        .iter()
        .find(|f| f.primary)
        .or_else(|| latest.files.first())?;

    Some(LatestFile {
        slug: slug.into(),
        version_number: latest.version_number.clone(),
        filename: file.filename.clone(),
        url: file.url.clone(),
        size: file.size,
    })
}
