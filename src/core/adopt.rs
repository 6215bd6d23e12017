use tracing::{debug, warn};

use crate::{
    api::ModrinthApi,
    core::utils,
    error::ModSyncError,
    model::{Config, LocalMod},
};

/// Result of trying to add slugs to the config
#[derive(Debug, Default)]
pub struct Tracked {
    /// Slugs that were appended to the config
    pub added: Vec<String>,
    /// Slugs or files that couldn't be added, with the reason
    pub rejected: Vec<(String, String)>,
}

/// Check each slug against Modrinth and add the ones that exist to `config`
///
/// Does not save the config.
pub fn add_verified(
    api: &impl ModrinthApi,
    config: &mut Config,
    slugs: &[impl AsRef<str>],
) -> Tracked {
    let mut tracked = Tracked::default();
    let mut valid = vec![];
    for slug in slugs {
        let slug = slug.as_ref().trim().to_lowercase();
        if config.has_mod(&slug) {
            debug!("{} is already configured", slug);
            tracked.rejected.push((slug, "already configured".into()));
            continue;
        }

        match api.project_exists(&slug) {
            Ok(true) => valid.push(slug),
            Ok(false) => tracked.rejected.push((slug, "not found on Modrinth".into())),
            Err(e) => {
                warn!("Unable to check '{}': {}", slug, e);
                tracked.rejected.push((slug, e.to_string()));
            }
        }
    }

    tracked.added = config.add_mods(&valid);
    tracked
}

/// Slugs worth trying for an unmanaged jar, best first
///
/// Every candidate is a prefix of the file name, so once added the jar is
/// matched by it on the next run.
pub fn candidate_slugs(local: &LocalMod) -> Vec<String> {
    let filename = local.filename.to_lowercase();
    let mut candidates = vec![];
    if let Some(meta) = &local.meta {
        let id = meta.id.to_lowercase();
        if filename.starts_with(&id) {
            candidates.push(id);
        }
    }
    if let Some(guess) = utils::guess_slug(&local.filename) {
        if !candidates.contains(&guess) {
            candidates.push(guess);
        }
    }

    candidates
}

/// Add a Modrinth project for each unmanaged jar where one can be found
///
/// Does not save the config.
pub fn adopt(api: &impl ModrinthApi, config: &mut Config, unmanaged: &[&LocalMod]) -> Tracked {
    let mut found = vec![];
    let mut rejected = vec![];
    for local in unmanaged {
        match first_existing(api, &candidate_slugs(local)) {
            Ok(Some(slug)) => {
                debug!("Adopting {} as {}", local.filename, slug);
                found.push(slug);
            }
            Ok(None) => rejected.push((local.filename.clone(), "no matching project".into())),
            Err(e) => rejected.push((local.filename.clone(), e.to_string())),
        }
    }

    Tracked {
        added: config.add_mods(&found),
        rejected,
    }
}

fn first_existing(
    api: &impl ModrinthApi,
    candidates: &[String],
) -> Result<Option<String>, ModSyncError> {
    let mut last_err = None;
    for slug in candidates {
        match api.project_exists(slug) {
            Ok(true) => return Ok(Some(slug.clone())),
            Ok(false) => {}
            Err(e) => {
                debug!("Skipping candidate '{}': {}", slug, e);
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(e) => Err(e),
        None => Ok(None),
    }
}
