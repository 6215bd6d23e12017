use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, error, warn};

use crate::{
    api::ModrinthApi,
    core::{manage, utils},
    error::ModSyncError,
    model::{LocalMod, ModReport, ModStatus, ResolvedInstance, UpdateOutcome},
};

/// Compare each configured mod against the newest matching version on Modrinth
/// # Params
/// * api - the Modrinth client
/// * instance - supplies the game version and loader to filter versions by
/// * slugs - configured mods, reports come back in the same order
/// * local - jars found in the instance's mods folder
///
/// Lookup failures are logged and the mod is reported as not found.
pub fn check(
    api: &impl ModrinthApi,
    instance: &ResolvedInstance,
    slugs: &[impl AsRef<str>],
    local: &[LocalMod],
) -> Vec<ModReport> {
    slugs
        .iter()
        .map(|slug| {
            let slug = slug.as_ref();
            let latest = match api.latest_version(slug, &instance.game_version, &instance.loader) {
                Ok(Some(latest)) => Some(latest),
                Ok(None) => {
                    warn!(
                        "Modrinth data not found for '{}' ({} {})",
                        slug, instance.loader, instance.game_version
                    );
                    None
                }
                Err(e) => {
                    error!("Unable to look up '{}': {}", slug, e);
                    None
                }
            };
            let current = utils::match_owned(slug, slugs, local).cloned();
            let latest_name = latest.as_ref().map(|l| l.filename.as_str());
            let status = classify(current.as_ref(), latest_name);
            debug!("{} is {:?}", slug, status);

            ModReport {
                slug: slug.into(),
                status,
                current,
                latest,
            }
        })
        .collect()
}

fn classify(current: Option<&LocalMod>, latest: Option<&str>) -> ModStatus {
    match (current, latest) {
        (_, None) => ModStatus::NotFoundRemotely,
        (None, Some(_)) => ModStatus::MissingLocally,
        (Some(current), Some(latest)) if current.filename == latest => ModStatus::UpToDate,
        (Some(_), Some(_)) => ModStatus::UpdateAvailable,
    }
}

/// Reports for mods that have something to download
pub fn get_outdated(reports: &[ModReport]) -> Vec<&ModReport> {
    reports
        .iter()
        .filter(|r| r.status.needs_download())
        .collect()
}

/// Download the latest file for each outdated mod, backing up whatever it replaces
/// # Params
/// * api - the Modrinth client
/// * outdated - mods to update. Should come from `get_outdated`
/// * instance - the instance whose mods folder is updated
/// * progress - called with `(report, delta, current, total)` as each file downloads
///
/// A failed download puts the backed up file back and moves on to the next mod.
/// A local file is only ever replaced once, later reports that point at it fail.
pub fn update<F>(
    api: &impl ModrinthApi,
    outdated: &[&ModReport],
    instance: &ResolvedInstance,
    mut progress: F,
) -> Vec<UpdateOutcome>
where
    F: FnMut(&ModReport, u64, u64, u64),
{
    let mut outcomes = vec![];
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    for report in outdated {
        let res = match &report.current {
            Some(current) => match claimed.get(&current.path) {
                Some(owner) => Err(ModSyncError::AlreadyReplaced {
                    slug: owner.clone(),
                    path: current.path.clone(),
                }),
                None => {
                    claimed.insert(current.path.clone(), report.slug.clone());
                    update_one(api, report, instance, &mut progress)
                }
            },
            None => update_one(api, report, instance, &mut progress),
        };
        let outcome = match res {
            Ok((path, backup)) => UpdateOutcome::Installed {
                slug: report.slug.clone(),
                path,
                backup,
            },
            Err(error) => {
                error!("Failed to update {}: {}", report.slug, error);
                UpdateOutcome::Failed {
                    slug: report.slug.clone(),
                    error,
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

fn update_one<F>(
    api: &impl ModrinthApi,
    report: &ModReport,
    instance: &ResolvedInstance,
    progress: &mut F,
) -> Result<(PathBuf, Option<PathBuf>), ModSyncError>
where
    F: FnMut(&ModReport, u64, u64, u64),
{
    let latest = report.latest.as_ref().ok_or_else(|| {
        ModSyncError::MiscError(format!("No download available for {}", report.slug))
    })?;

    let filename = Path::new(&latest.filename)
        .file_name()
        .filter(|name| *name == latest.filename.as_str())
        .ok_or_else(|| ModSyncError::UnsafeFilename(latest.filename.clone()))?;

    fs::create_dir_all(&instance.mods_dir)?;
    let backup = match &report.current {
        Some(current) => Some(manage::backup_mod(&current.path, &instance.backup_dir)?),
        None => None,
    };

    let target = instance.mods_dir.join(filename);
    let res = api.download(&latest.url).and_then(|dl| {
        manage::download_file_with_progress(dl.reader, dl.len, &target, |d, c, t| {
            progress(report, d, c, t)
        })
    });

    match res {
        Ok(_) => {
            debug!("Installed {} to {}", latest.filename, target.display());
            Ok((target, backup))
        }
        Err(e) => {
            if let (Some(backup), Some(current)) = (&backup, &report.current) {
                if let Err(restore) = manage::restore_mod(backup, &current.path) {
                    error!(
                        "Unable to restore {} from {}: {}",
                        current.path.display(),
                        backup.display(),
                        restore
                    );
                }
            }
            Err(e)
        }
    }
}
