// tests/workflow.rs

//! End-to-end queries over an installed database and file-backed repositories.

mod common;

use common::{names, setup_repos_dir, write_repo, write_upstream};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zif::{
    Cancellable, Completion, Config, Error, LocalStore, Operation, Package, PackageId, Repos, Sack,
    Store,
};

const FEDORA_MD: &str = r#"{
    "packages": [
        {"name": "hal", "version": "0.5.11", "arch": "i386", "summary": "Hardware Abstraction Layer",
         "group": "System Environment/Base"},
        {"name": "hal-info", "version": "20090414", "summary": "Device information files for HAL"},
        {"name": "gnome-power-manager", "version": "2.26.0", "arch": "i386",
         "summary": "GNOME power management service",
         "files": ["/usr/bin/gnome-power-manager"], "categories": ["apps"]}
    ],
    "categories": [
        {"id": "apps", "name": "Applications"},
        {"parent_id": "apps", "id": "system-tools", "name": "System Tools"}
    ]
}"#;

const UPDATES_MD: &str = r#"{
    "packages": [
        {"name": "hal", "version": "0.5.12", "arch": "i386", "summary": "Hardware Abstraction Layer"},
        {"name": "gnome-power-manager", "version": "2.26.0", "arch": "i386",
         "files": ["/usr/bin/gnome-power-manager"], "categories": ["apps"]}
    ],
    "categories": [
        {"id": "apps", "name": "Applications"},
        {"parent_id": "apps", "id": "editors", "name": "Editors"}
    ]
}"#;

struct World {
    _temp: TempDir,
    config: Config,
    local: Arc<LocalStore>,
    repos: Repos,
}

fn setup_world() -> World {
    let (temp, config) = setup_repos_dir();
    let fedora = write_upstream(temp.path(), "fedora", FEDORA_MD);
    let updates = write_upstream(temp.path(), "updates", UPDATES_MD);
    write_repo(
        &config,
        "fedora.repo",
        &format!("[fedora]\nname=Fedora $releasever\nbaseurl={}\n", fedora.display()),
    );
    write_repo(
        &config,
        "fedora-updates.repo",
        &format!("[updates]\nname=Updates\nbaseurl=file://{}\nenabled=1\n", updates.display()),
    );
    write_repo(&config, "testing.repo", "[testing]\nbaseurl=/nonexistent\nenabled=0\n");

    let local = Arc::new(LocalStore::open(&config.installed_db).unwrap());
    let mut hal = Package::new("hal", "0.5.11", "i386", "installed");
    hal.summary = "Hardware Abstraction Layer".to_string();
    hal.group = Some("System Environment/Base".to_string());
    hal.files = vec!["/usr/sbin/hald".to_string()];
    local.add_package(&hal).unwrap();

    let repos = Repos::open(config.clone())
        .unwrap()
        .with_installed(local.clone() as Arc<dyn Store>);

    World {
        _temp: temp,
        config,
        local,
        repos,
    }
}

fn remote_sack(world: &World) -> Sack {
    let mut sack = Sack::new();
    sack.add_remote_enabled(&world.repos, &Completion::new()).unwrap();
    sack
}

fn full_sack(world: &World) -> Sack {
    let mut sack = Sack::new();
    sack.add_store(world.local.clone());
    sack.add_remote_enabled(&world.repos, &Completion::new()).unwrap();
    sack
}

#[test]
fn test_resolve_across_all_stores() {
    let world = setup_world();
    let sack = full_sack(&world);
    assert_eq!(sack.len(), 3);

    let completion = Completion::new();
    let found = sack.resolve("hal", &Cancellable::new(), &completion).unwrap();

    let ids: Vec<String> = found.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(
        ids,
        ["hal;0.5.11;i386;installed", "hal;0.5.11;i386;fedora", "hal;0.5.12;i386;updates"]
    );
    assert_eq!(completion.percentage(), 100);
}

#[test]
fn test_refresh_tolerates_installed_store() {
    let world = setup_world();
    let sack = full_sack(&world);

    // the installed store cannot refresh; the repositories still do
    let completion = Completion::new();
    sack.refresh(false, &Cancellable::new(), &completion).unwrap();
    assert_eq!(completion.percentage(), 100);
    assert!(world.config.cache_dir.join("fedora/repomd.json").exists());
    assert!(world.config.cache_dir.join("updates/repomd.json").exists());
    assert!(!world.config.cache_dir.join("testing").exists());
}

#[test]
fn test_clean_fails_on_installed_store() {
    let world = setup_world();
    let err = full_sack(&world)
        .clean(&Cancellable::new(), &Completion::new())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::StoreOperationFailed { ref store, operation: Operation::Clean, .. } if store == "installed"
    ));
    assert!(err.is_not_supported());

    let sack = remote_sack(&world);
    sack.load(&Cancellable::new(), &Completion::new()).unwrap();
    sack.clean(&Cancellable::new(), &Completion::new()).unwrap();
    assert!(!world.config.cache_dir.join("fedora").exists());
}

#[test]
fn test_get_updates_from_repositories() {
    let world = setup_world();
    let updates = remote_sack(&world)
        .get_updates(&Cancellable::new(), &Completion::new())
        .unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id().to_string(), "hal;0.5.12;i386;updates");
}

#[test]
fn test_categories_are_merged() {
    let world = setup_world();
    let sack = remote_sack(&world);
    let c = Cancellable::new();

    let found = sack.search_category("apps", &c, &Completion::new()).unwrap();
    assert_eq!(names(&found), ["gnome-power-manager"]);
    assert_eq!(found[0].data, "fedora");

    let categories = sack.get_categories(&c, &Completion::new()).unwrap();
    let ids: Vec<&str> = categories.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, ["apps", "system-tools", "editors"]);

    // the installed store has no categories
    let err = full_sack(&world).get_categories(&c, &Completion::new()).unwrap_err();
    assert!(err.is_not_supported());
}

#[test]
fn test_file_queries() {
    let world = setup_world();
    let sack = full_sack(&world);
    let c = Cancellable::new();

    let by_provide = sack
        .what_provides("/usr/bin/gnome-power-manager", &c, &Completion::new())
        .unwrap();
    let by_file = sack
        .search_file("/usr/bin/gnome-power-manager", &c, &Completion::new())
        .unwrap();
    assert_eq!(by_provide, by_file);
    assert_eq!(by_file.len(), 2);

    let installed = sack.search_file("/usr/sbin/hald", &c, &Completion::new()).unwrap();
    assert_eq!(installed[0].data, "installed");
}

#[test]
fn test_find_package_in_any_store() {
    let world = setup_world();
    let sack = full_sack(&world);
    let c = Cancellable::new();

    let id = PackageId::parse("hal;0.5.12;i386;updates").unwrap();
    let found = sack.find_package(&id, &c, &Completion::new()).unwrap().unwrap();
    assert_eq!(found.summary, "Hardware Abstraction Layer");

    let installed = PackageId::parse("hal;0.5.11;i386;installed").unwrap();
    let found = sack.find_package(&installed, &c, &Completion::new()).unwrap().unwrap();
    assert_eq!(found.files, ["/usr/sbin/hald"]);

    let missing = PackageId::parse("kernel;2.6.29;i686;fedora").unwrap();
    assert!(sack.find_package(&missing, &c, &Completion::new()).unwrap().is_none());
}

#[test]
fn test_search_details_spans_summaries() {
    let world = setup_world();
    let sack = full_sack(&world);
    let found = sack
        .search_details("device information", &Cancellable::new(), &Completion::new())
        .unwrap();
    assert_eq!(names(&found), ["hal-info"]);
}

#[test]
fn test_search_group_matches_exactly() {
    let world = setup_world();
    let sack = full_sack(&world);
    let c = Cancellable::new();

    let found = sack
        .search_group("System Environment/Base", &c, &Completion::new())
        .unwrap();
    let ids: Vec<String> = found.iter().map(|p| p.id().to_string()).collect();
    assert_eq!(ids, ["hal;0.5.11;i386;installed", "hal;0.5.11;i386;fedora"]);

    assert!(sack.search_group("System", &c, &Completion::new()).unwrap().is_empty());
}

#[test]
fn test_cancelled_query_names_first_store() {
    let world = setup_world();
    let sack = remote_sack(&world);
    let cancellable = Cancellable::new();
    cancellable.cancel();

    let err = sack
        .search_name("hal", &cancellable, &Completion::new())
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Cancelled));
    assert!(err.to_string().starts_with("failed to search-name in fedora"));
}

#[test]
fn test_shared_instances() {
    let (_temp, config) = setup_repos_dir();

    let first = LocalStore::shared(&config.installed_db).unwrap();
    let second = LocalStore::shared(Path::new("/nonexistent/other.db")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let mut sack = Sack::new();
    sack.add_local(&config.installed_db).unwrap();
    first.add_package(&Package::new("bash", "4.0", "i386", "installed")).unwrap();
    let found = sack.get_packages(&Cancellable::new(), &Completion::new()).unwrap();
    assert_eq!(names(&found), ["bash"]);

    let repos = Repos::shared(&config).unwrap();
    let again = Repos::shared(&Config::default()).unwrap();
    assert!(Arc::ptr_eq(&repos, &again));
    assert_eq!(again.repos_dir(), Some(config.repos_dir.clone()));
}
