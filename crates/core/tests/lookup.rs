//! End-to-end discovery tests over real fixture trees.

use genscope_core::{Environment, EnvironmentOptions, LookupOptions, NamespaceLookupOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create `<root>/<package>/generators/<name>/generator.toml` fixtures.
fn write_generator(root: &Path, package: &str, name: &str) -> PathBuf {
    let entry = root
        .join(package)
        .join("generators")
        .join(name)
        .join("generator.toml");
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, "[generator]\n").unwrap();
    entry
}

fn env_at(dir: &Path) -> Environment {
    Environment::new(EnvironmentOptions {
        cwd: Some(dir.to_path_buf()),
    })
}

#[test]
fn lookup_registers_generators_from_explicit_package_paths() {
    let temp = TempDir::new().unwrap();
    let entry_a = write_generator(temp.path(), "gen-alpha", "app");
    let entry_b = write_generator(temp.path(), "gen-beta", "app");

    let mut env = env_at(temp.path());
    let discovered = env.lookup(&LookupOptions {
        package_paths: vec![temp.path().join("gen-alpha"), temp.path().join("gen-beta")],
        ..Default::default()
    });

    assert_eq!(discovered.len(), 2);
    assert!(discovered.iter().all(|d| d.registered));
    assert_eq!(env.namespaces().len(), 2);
    assert_eq!(
        env.get("alpha:app").unwrap().resolved,
        entry_a.canonicalize().unwrap()
    );
    assert_eq!(
        env.get("beta:app").unwrap().resolved,
        entry_b.canonicalize().unwrap()
    );
}

#[test]
fn lookup_discovers_packages_from_search_roots() {
    let temp = TempDir::new().unwrap();
    write_generator(temp.path(), "gen-dummy", "app");
    write_generator(temp.path(), "gen-dummy", "cli");
    write_generator(temp.path(), "@scope/gen-scoped", "app");
    // A directory that matches no package pattern stays invisible.
    write_generator(temp.path(), "plain-folder", "app");

    let mut env = env_at(temp.path());
    env.lookup(&LookupOptions {
        npm_paths: vec![temp.path().to_path_buf()],
        ..Default::default()
    });

    let namespaces = env.namespaces();
    assert!(namespaces.contains(&"dummy:app".to_string()));
    assert!(namespaces.contains(&"dummy:cli".to_string()));
    assert!(namespaces.contains(&"@scope/scoped:app".to_string()));
    assert_eq!(namespaces.len(), 3);

    assert!(env.is_package_registered("dummy"));
    assert!(env.is_package_registered("@scope/scoped"));
    assert_eq!(
        env.get_package_path("@scope/scoped"),
        Some(temp.path().join("@scope/gen-scoped"))
    );
}

#[test]
fn later_roots_take_priority_in_bulk_mode() {
    let high = TempDir::new().unwrap();
    let low = TempDir::new().unwrap();
    let high_entry = write_generator(high.path(), "gen-dummy", "app");
    write_generator(low.path(), "gen-dummy", "app");

    let mut env = env_at(high.path());
    // `high` first: bulk mode visits in reverse so it registers last and wins.
    env.lookup(&LookupOptions {
        npm_paths: vec![high.path().to_path_buf(), low.path().to_path_buf()],
        ..Default::default()
    });

    assert_eq!(env.namespaces().len(), 1);
    assert_eq!(
        env.get("dummy:app").unwrap().resolved,
        high_entry.canonicalize().unwrap()
    );
    // Both providers stay queryable, most recent first.
    assert_eq!(
        env.get_package_paths("dummy").unwrap(),
        vec![high.path().join("gen-dummy"), low.path().join("gen-dummy")]
    );
}

#[test]
fn single_result_stops_at_the_first_registration() {
    let temp = TempDir::new().unwrap();
    write_generator(temp.path(), "gen-alpha", "app");
    write_generator(temp.path(), "gen-beta", "app");

    let mut env = env_at(temp.path());
    let discovered = env.lookup(&LookupOptions {
        npm_paths: vec![temp.path().to_path_buf()],
        single_result: true,
        ..Default::default()
    });

    assert_eq!(discovered.len(), 1);
    assert!(discovered[0].registered);
    assert_eq!(env.namespaces().len(), 1);
}

#[test]
fn lookup_custom_file_patterns() {
    let temp = TempDir::new().unwrap();
    let package = temp.path().join("gen-legacy");
    let entry = package.join("generators/app/index.js");
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, "module.exports = {};\n").unwrap();

    let mut env = env_at(temp.path());
    env.lookup(&LookupOptions {
        npm_paths: vec![temp.path().to_path_buf()],
        file_patterns: Some(vec!["generators/*/index.js".to_string()]),
        ..Default::default()
    });

    assert_eq!(
        env.get("legacy:app").unwrap().resolved,
        entry.canonicalize().unwrap()
    );
}

#[cfg(unix)]
#[test]
fn lookup_follows_symlinked_packages() {
    let temp = TempDir::new().unwrap();
    let real = temp.path().join("checkout/gen-linked");
    let entry = real.join("generators/app/generator.toml");
    fs::create_dir_all(entry.parent().unwrap()).unwrap();
    fs::write(&entry, "").unwrap();

    let root = temp.path().join("node_modules");
    fs::create_dir_all(&root).unwrap();
    std::os::unix::fs::symlink(&real, root.join("gen-linked")).unwrap();

    let mut env = env_at(temp.path());
    env.lookup(&LookupOptions {
        npm_paths: vec![root],
        ..Default::default()
    });

    let meta = env.get("linked:app").unwrap();
    // The namespace comes from the install location, the resolved path from
    // the symlink target.
    assert_eq!(meta.namespace, "linked:app");
    assert_eq!(meta.resolved, entry.canonicalize().unwrap());
}

#[test]
fn lookup_namespace_finds_entries_without_registering() {
    let temp = TempDir::new().unwrap();
    let entry = write_generator(temp.path(), "gen-dummy", "app");
    write_generator(temp.path(), "gen-dummy", "cli");

    let found = Environment::lookup_namespace(
        "dummy:app",
        &NamespaceLookupOptions {
            npm_paths: vec![temp.path().to_path_buf()],
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        },
    );
    assert_eq!(found, vec![entry]);
}

#[test]
fn lookup_namespace_can_return_the_package_root() {
    let temp = TempDir::new().unwrap();
    write_generator(temp.path(), "gen-dummy", "app");

    let found = Environment::lookup_namespace(
        "dummy",
        &NamespaceLookupOptions {
            npm_paths: vec![temp.path().to_path_buf()],
            cwd: Some(temp.path().to_path_buf()),
            package_path: true,
            ..Default::default()
        },
    );
    assert_eq!(found, vec![temp.path().join("gen-dummy")]);
}

#[test]
fn failed_entries_do_not_abort_the_pass() {
    let temp = TempDir::new().unwrap();
    write_generator(temp.path(), "gen-good", "app");
    // A package whose entry derives an empty namespace cannot register.
    let odd = temp.path().join("gen-");
    fs::create_dir_all(&odd).unwrap();
    fs::write(odd.join("generator.toml"), "").unwrap();

    let mut env = env_at(temp.path());
    let discovered = env.lookup(&LookupOptions {
        npm_paths: vec![temp.path().to_path_buf()],
        file_patterns: Some(vec![
            "generator.toml".to_string(),
            "generators/*/generator.toml".to_string(),
        ]),
        ..Default::default()
    });

    assert!(env.get("good:app").is_some());
    assert!(discovered.iter().any(|d| !d.registered));
    assert!(discovered.iter().any(|d| d.registered));
}
