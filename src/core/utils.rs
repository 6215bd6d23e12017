use crate::error::ModSyncError;
use crate::model::FabricModJson;
use crate::model::LocalMod;

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};
use zip::ZipArchive;

pub const CONFIG_ENV: &str = "MODSYNC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = ".puffer_scripts_config.json";

lazy_static! {
    // name, then an optional tail that starts at the first version or loader marker
    static ref STEM_RE: Regex = Regex::new(
        r"^([a-z0-9]+(?:[-_ ][a-z0-9]+)*?)(?:[-_ +](?:v?\d|mc\d|fabric|forge|neoforge|quilt).*)?$"
    )
    .expect("stem regex");
}

fn home_dir() -> Result<PathBuf, ModSyncError> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ModSyncError::NoHomeDir)
}

/// Replace a leading `~` with the user's home directory
pub fn expand_home(path: impl AsRef<Path>) -> Result<PathBuf, ModSyncError> {
    let path = path.as_ref();
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => Ok(home_dir()?.join(components)),
        _ => Ok(path.to_path_buf()),
    }
}

/// Where to look for the config file when none was given on the command line
///
/// Checks `MODSYNC_CONFIG` first, then falls back to the home directory
pub fn default_config_path() -> Result<PathBuf, ModSyncError> {
    match env::var_os(CONFIG_ENV) {
        Some(p) if !p.is_empty() => expand_home(PathBuf::from(p)),
        _ => Ok(home_dir()?.join(DEFAULT_CONFIG_FILE)),
    }
}

/// Search a directory for jar files
///
/// Only looks at direct children. The result is sorted by file name.
pub fn find_mods(dir: impl AsRef<Path>) -> Result<Vec<LocalMod>, ModSyncError> {
    let dir = dir.as_ref();
    if !dir.try_exists()? {
        warn!("Mods directory {} doesn't exist", dir.display());
        return Ok(vec![]);
    }

    let mut res = vec![];
    for child in dir.read_dir()? {
        let path = child?.path();
        let is_jar = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("jar"));
        if !is_jar || !path.is_file() {
            trace!("Skipping {}", path.display());
            continue;
        }

        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let meta = match read_fabric_meta(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("Unable to read metadata from {}: {}", path.display(), e);
                None
            }
        };

        res.push(LocalMod {
            path,
            filename,
            meta,
        });
    }

    res.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(res)
}

/// Read `fabric.mod.json` out of a mod jar, if it has one
pub fn read_fabric_meta(jar: impl AsRef<Path>) -> Result<Option<FabricModJson>, ModSyncError> {
    let mut archive = ZipArchive::new(File::open(jar.as_ref())?)?;
    let mut raw = String::new();
    match archive.by_name("fabric.mod.json") {
        Ok(mut file) => {
            file.read_to_string(&mut raw)?;
        }
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    Ok(Some(json5::from_str(&raw)?))
}

/// Returns the first mod whose file name starts with `slug`, ignoring case
pub fn match_prefix<'a>(slug: impl AsRef<str>, mods: &'a [LocalMod]) -> Option<&'a LocalMod> {
    let slug = slug.as_ref().to_lowercase();
    mods.iter()
        .find(|m| m.filename.to_lowercase().starts_with(&slug))
}

/// The first mod `slug` manages among all configured `slugs`
///
/// A file that a longer configured slug also prefixes belongs to that slug, so
/// with `sodium` and `sodium-extra` both configured, `sodium-extra-0.5.4.jar`
/// is never handed to `sodium`.
pub fn match_owned<'a>(
    slug: impl AsRef<str>,
    slugs: &[impl AsRef<str>],
    mods: &'a [LocalMod],
) -> Option<&'a LocalMod> {
    let slug = slug.as_ref().to_lowercase();
    let longer = slugs
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .filter(|s| s.len() > slug.len() && s.starts_with(&slug))
        .collect::<Vec<_>>();

    mods.iter().find(|m| {
        let name = m.filename.to_lowercase();
        name.starts_with(&slug) && !longer.iter().any(|l| name.starts_with(l.as_str()))
    })
}

/// Pair each configured slug with the file it manages
pub fn get_current_mods<'a>(
    slugs: &[impl AsRef<str>],
    mods: &'a [LocalMod],
) -> BTreeMap<String, &'a LocalMod> {
    slugs
        .iter()
        .filter_map(|s| match_owned(s, slugs, mods).map(|m| (s.as_ref().to_string(), m)))
        .collect()
}

/// Jars that no configured slug claims
pub fn find_unmanaged<'a>(slugs: &[impl AsRef<str>], mods: &'a [LocalMod]) -> Vec<&'a LocalMod> {
    let slugs = slugs
        .iter()
        .map(|s| s.as_ref().to_lowercase())
        .collect::<Vec<_>>();

    mods.iter()
        .filter(|m| {
            let name = m.filename.to_lowercase();
            !slugs.iter().any(|s| name.starts_with(s.as_str()))
        })
        .collect()
}

/// Best guess at a project slug from a jar's file name
///
/// The guess is always a prefix of the lowercased file name.
pub fn guess_slug(filename: impl AsRef<str>) -> Option<String> {
    let lower = filename.as_ref().to_lowercase();
    let stem = lower.strip_suffix(".jar").unwrap_or(&lower);

    STEM_RE
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod test {
    use std::{
        env, fs,
        io::Write,
        path::{Path, PathBuf},
        sync::Mutex,
    };

    use tracing_test::traced_test;
    use zip::write::SimpleFileOptions;

    use super::{
        default_config_path, expand_home, find_mods, find_unmanaged, get_current_mods, guess_slug,
        home_dir, match_owned, match_prefix, CONFIG_ENV, DEFAULT_CONFIG_FILE,
    };
    use crate::model::LocalMod;

    // tests that read or change the process environment take this first
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn local(name: &str) -> LocalMod {
        LocalMod {
            path: Path::new("mods").join(name),
            filename: name.into(),
            meta: None,
        }
    }

    fn write_jar(path: &Path, mod_json: Option<&str>) {
        let mut jar = zip::ZipWriter::new(fs::File::create(path).unwrap());
        if let Some(json) = mod_json {
            jar.start_file("fabric.mod.json", SimpleFileOptions::default())
                .unwrap();
            jar.write_all(json.as_bytes()).unwrap();
        }
        jar.start_file("META-INF/MANIFEST.MF", SimpleFileOptions::default())
            .unwrap();
        jar.write_all(b"Manifest-Version: 1.0\n").unwrap();
        jar.finish().unwrap();
    }

    #[test]
    fn prefix_match_ignores_case_and_takes_first() {
        let mods = vec![
            local("Sodium-Extra-0.5.4.jar"),
            local("sodium-fabric-0.5.8.jar"),
        ];

        let found = match_prefix("SODIUM", &mods).unwrap();
        assert_eq!(found.filename, "Sodium-Extra-0.5.4.jar");
        assert!(match_prefix("iris", &mods).is_none());
    }

    #[test]
    fn current_and_unmanaged() {
        let mods = vec![
            local("appleskin-fabric-mc1.20.4-2.5.1.jar"),
            local("lithium-fabric-0.12.1.jar"),
            local("worldedit-mod-7.3.0.jar"),
        ];
        let slugs = ["lithium", "appleskin", "iris"];

        let current = get_current_mods(&slugs, &mods);
        assert_eq!(current.len(), 2);
        assert_eq!(current["lithium"].filename, "lithium-fabric-0.12.1.jar");
        assert!(!current.contains_key("iris"));

        let unmanaged = find_unmanaged(&slugs, &mods);
        assert_eq!(unmanaged.len(), 1);
        assert_eq!(unmanaged[0].filename, "worldedit-mod-7.3.0.jar");
    }

    #[test]
    fn longer_slug_keeps_its_jar() {
        let mods = vec![
            local("sodium-extra-0.5.4.jar"),
            local("sodium-fabric-0.5.7.jar"),
        ];
        let slugs = ["sodium", "sodium-extra"];

        let found = match_owned("sodium", &slugs, &mods).unwrap();
        assert_eq!(found.filename, "sodium-fabric-0.5.7.jar");
        let found = match_owned("Sodium-Extra", &slugs, &mods).unwrap();
        assert_eq!(found.filename, "sodium-extra-0.5.4.jar");

        let current = get_current_mods(&slugs, &mods);
        assert_eq!(current["sodium"].filename, "sodium-fabric-0.5.7.jar");
        assert_eq!(current["sodium-extra"].filename, "sodium-extra-0.5.4.jar");

        let only_extra = vec![local("sodium-extra-0.5.4.jar")];
        assert!(match_owned("sodium", &slugs, &only_extra).is_none());
        assert!(match_owned("sodium", &["sodium"], &only_extra).is_some());
    }

    #[test]
    fn guess_slugs() {
        let cases = [
            ("sodium-fabric-0.5.8+mc1.20.4.jar", "sodium"),
            ("lithium-fabric-mc1.20.4-0.12.1.jar", "lithium"),
            ("fabric-api-0.92.0+1.20.1.jar", "fabric-api"),
            ("Xaeros_Minimap_24.0.3_Fabric_1.20.4.jar", "xaeros_minimap"),
            ("modmenu-v9.0.0.jar", "modmenu"),
            ("ferritecore.jar", "ferritecore"),
        ];
        for (file, slug) in cases {
            let guess = guess_slug(file).unwrap();
            assert_eq!(guess, slug, "guessing slug for {file}");
            assert!(file.to_lowercase().starts_with(&guess));
        }
    }

    #[test]
    fn scan_mods_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(
            &dir.path().join("zoomify-2.13.jar"),
            Some(r#"{ "schemaVersion": 1, "id": "zoomify", "version": "2.13", "name": "Zoomify" }"#),
        );
        write_jar(&dir.path().join("Appleskin.JAR"), None);
        fs::write(dir.path().join("broken.jar"), b"not a zip").unwrap();
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("nested.jar")).unwrap();

        let mods = find_mods(dir.path()).unwrap();
        let names = mods.iter().map(|m| m.filename.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Appleskin.JAR", "broken.jar", "zoomify-2.13.jar"]);

        assert!(mods[0].meta.is_none());
        assert!(mods[1].meta.is_none());
        let meta = mods[2].meta.as_ref().unwrap();
        assert_eq!(meta.id, "zoomify");
        assert_eq!(meta.name.as_deref(), Some("Zoomify"));
        assert_eq!(mods[2].to_string(), "zoomify-2.13.jar (Zoomify 2.13)");
    }

    #[test]
    #[traced_test]
    fn scan_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mods = find_mods(dir.path().join("mods")).unwrap();
        assert!(mods.is_empty());
        assert!(logs_contain("doesn't exist"));
    }

    #[test]
    fn expand_plain_path() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(
            expand_home("/srv/games").unwrap(),
            Path::new("/srv/games").to_path_buf()
        );
        let home = expand_home("~/games").unwrap();
        assert!(home.ends_with("games"));
        assert!(!home.starts_with("~"));
    }

    #[test]
    fn config_path_from_env() {
        let _env = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let saved = env::var_os(CONFIG_ENV);
        let home = home_dir().unwrap();

        env::set_var(CONFIG_ENV, "/etc/modsync/config.json");
        assert_eq!(
            default_config_path().unwrap(),
            PathBuf::from("/etc/modsync/config.json")
        );

        env::set_var(CONFIG_ENV, "~/cfg.json");
        assert_eq!(default_config_path().unwrap(), home.join("cfg.json"));

        env::set_var(CONFIG_ENV, "");
        assert_eq!(default_config_path().unwrap(), home.join(DEFAULT_CONFIG_FILE));

        env::remove_var(CONFIG_ENV);
        assert_eq!(default_config_path().unwrap(), home.join(DEFAULT_CONFIG_FILE));

        match saved {
            Some(v) => env::set_var(CONFIG_ENV, v),
            None => env::remove_var(CONFIG_ENV),
        }
    }
}
