use std::{fs, io::Cursor, path::Path};

use serde_json::Value;

use crate::{
    api::{Download, MockModrinthApi},
    core::{adopt, check, find_mods, find_unmanaged, get_outdated, select_instance, update},
    model::{Config, LatestFile, ModStatus, Overrides},
};

fn latest(filename: &str) -> LatestFile {
    LatestFile {
        slug: filename.split('-').next().unwrap_or_default().into(),
        version_number: "1.0".into(),
        filename: filename.into(),
        url: format!("https://cdn.modrinth.com/{filename}"),
        size: 7,
    }
}

fn setup(root: &Path) -> std::path::PathBuf {
    let mods = root.join("instances/Survival/.minecraft/mods");
    fs::create_dir_all(&mods).unwrap();
    for jar in ["Lithium-0.12.0.jar", "sodium-0.5.8.jar", "zoomify-2.13.jar"] {
        fs::write(mods.join(jar), b"old jar").unwrap();
    }

    let config = serde_json::json!({
        "instances_dir": root.join("instances"),
        "is_server": false,
        "instances": { "survival": { "instance_dir": "Survival", "version": "1.20.4" } },
        "mods": ["sodium", "lithium", "iris", "ghost"],
        "editor": "vim"
    });
    let path = root.join("config.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

#[test]
fn sync_instance() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = setup(dir.path());
    let mut config = Config::load(&config_path).unwrap();

    let name = select_instance(&config, None, Cursor::new("1\n"), Vec::<u8>::new()).unwrap();
    let instance = config.resolve(&name, &Overrides::default()).unwrap();

    let mut api = MockModrinthApi::new();
    api.expect_latest_version()
        .returning(|slug, _, _| {
            Ok(match slug {
                "sodium" => Some(latest("sodium-0.5.8.jar")),
                "lithium" => Some(latest("lithium-0.12.1.jar")),
                "iris" => Some(latest("iris-1.7.0.jar")),
                _ => None,
            })
        });
    api.expect_download().times(2).returning(|_| {
        Ok(Download {
            len: Some(7),
            reader: Box::new(Cursor::new(b"new jar".to_vec())),
        })
    });
    api.expect_project_exists()
        .returning(|slug| Ok(slug == "zoomify"));

    let local = find_mods(&instance.mods_dir).unwrap();
    let reports = check(&api, &instance, &config.mods, &local);
    let statuses = reports.iter().map(|r| r.status).collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ModStatus::UpToDate,
            ModStatus::UpdateAvailable,
            ModStatus::MissingLocally,
            ModStatus::NotFoundRemotely
        ]
    );

    let outcomes = update(&api, &get_outdated(&reports), &instance, |_, _, _, _| {});
    assert!(outcomes.iter().all(|o| o.is_installed()));
    assert!(instance.backup_dir.join("Lithium-0.12.0.jar").exists());

    let local = find_mods(&instance.mods_dir).unwrap();
    let names = local.iter().map(|m| m.filename.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["iris-1.7.0.jar", "lithium-0.12.1.jar", "sodium-0.5.8.jar", "zoomify-2.13.jar"]
    );

    let unmanaged = find_unmanaged(&config.mods, &local);
    let tracked = adopt(&api, &mut config, &unmanaged);
    assert_eq!(tracked.added, vec!["zoomify"]);
    config.save().unwrap();

    let saved: Value = serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(saved["editor"], "vim");
    assert_eq!(
        saved["mods"],
        serde_json::json!(["sodium", "lithium", "iris", "ghost", "zoomify"])
    );
    assert!(find_unmanaged(&Config::load(&config_path).unwrap().mods, &local).is_empty());
}
