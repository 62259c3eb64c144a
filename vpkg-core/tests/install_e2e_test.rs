//! End-to-end installs against a fixture registry

mod common;

use anyhow::Result;
use common::{
    create_go_project, init_test_logging, listing_json, serve_cache_registry, FixtureServer,
    CACHE_MANIFEST,
};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use vpkg_core::installer::{spawn_install, InstallStep, STAGING_PREFIX};
use vpkg_core::store::InstalledPackageRecord;
use vpkg_core::{
    ErrorKind, InstallOptions, InstallOutcome, InstalledIndex, Installer, RegistryClient, Settings,
    Uninstaller,
};

const EXPECTED_CLIENT: &str =
    "package cache\n\n// Cache 1.2.0 for example.com/app\nconst Name = \"acme/cache\"\n";

async fn setup() -> Result<(FixtureServer, TempDir, Installer)> {
    init_test_logging();
    let server = FixtureServer::start().await;
    serve_cache_registry(&server);

    let project = TempDir::new()?;
    create_go_project(project.path(), "example.com/app");
    let installer = Installer::new(RegistryClient::new(&server.settings())?, project.path());
    Ok((server, project, installer))
}

fn installed(outcome: InstallOutcome) -> vpkg_core::installer::InstallReceipt {
    match outcome {
        InstallOutcome::Installed(receipt) => receipt,
        InstallOutcome::DryRun(plan) => panic!("expected an install, got a dry run of {}", plan.name),
    }
}

#[tokio::test]
async fn test_install_renders_templates_and_copies_static_files() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    let receipt = installed(
        installer
            .install("acme/cache", &InstallOptions::default())
            .await?,
    );

    let dest = project.path().join("vpkg/acme/cache");
    assert_eq!(receipt.destination, dest);
    assert_eq!(receipt.discovered_by, "tree");
    assert_eq!(receipt.version, "1.2.0");

    assert_eq!(fs::read_to_string(dest.join("client.go"))?, EXPECTED_CLIENT);
    assert_eq!(fs::read_to_string(dest.join("README.md"))?, common::README);
    assert!(!dest.join("client.go.tmpl").exists());

    let record = InstalledPackageRecord::load_from_path(&dest.join("meta.yaml"))?;
    assert_eq!(record.name, "acme/cache");
    assert_eq!(record.version, "1.2.0");
    assert_eq!(record.path, "vpkg/acme/cache");
    assert_eq!(record.meta.title, "Cache");

    let mut paths: Vec<_> = receipt.files.iter().map(|f| f.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["README.md", "client.go"]);
    assert!(receipt.usage.contains("cache.Module"));
    Ok(())
}

#[tokio::test]
async fn test_second_install_without_force_leaves_files_untouched() -> Result<()> {
    let (server, project, installer) = setup().await?;
    installer
        .install("acme/cache", &InstallOptions::default())
        .await?;

    let dest = project.path().join("vpkg/acme/cache");
    let before_client = fs::read(dest.join("client.go"))?;
    let before_readme = fs::read(dest.join("README.md"))?;
    let before_meta = fs::read(dest.join("meta.yaml"))?;

    server.set("official/templates/client.go.tmpl", "package changed\n");

    let err = installer
        .install("acme/cache", &InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    assert_eq!(fs::read(dest.join("client.go"))?, before_client);
    assert_eq!(fs::read(dest.join("README.md"))?, before_readme);
    assert_eq!(fs::read(dest.join("meta.yaml"))?, before_meta);
    Ok(())
}

#[tokio::test]
async fn test_force_reinstall_overwrites_with_new_content() -> Result<()> {
    let (server, project, installer) = setup().await?;
    let force = InstallOptions {
        force: true,
        ..Default::default()
    };

    installer.install("acme/cache", &force).await?;

    server.set("official/templates/client.go.tmpl", "package {{.Package}} // v2\n");
    server.set("official/templates/README.md", "# Cache v2\n");
    installer.install("acme/cache", &force).await?;

    let dest = project.path().join("vpkg/acme/cache");
    assert_eq!(fs::read_to_string(dest.join("client.go"))?, "package cache // v2\n");
    assert_eq!(fs::read_to_string(dest.join("README.md"))?, "# Cache v2\n");
    Ok(())
}

#[tokio::test]
async fn test_version_precedence() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    let receipt = installed(
        installer
            .install(
                "acme/cache@2.0.0",
                &InstallOptions {
                    version: Some("1.9.0".to_string()),
                    ..Default::default()
                },
            )
            .await?,
    );
    assert_eq!(receipt.version, "2.0.0");

    let record =
        InstalledPackageRecord::load_from_path(&project.path().join("vpkg/acme/cache/meta.yaml"))?;
    assert_eq!(record.version, "2.0.0");
    Ok(())
}

#[tokio::test]
async fn test_dry_run_touches_nothing() -> Result<()> {
    let (server, project, installer) = setup().await?;

    let outcome = installer
        .install(
            "acme/cache",
            &InstallOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .await?;

    let InstallOutcome::DryRun(plan) = outcome else {
        panic!("expected a dry run");
    };
    assert_eq!(plan.destination, project.path().join("vpkg/acme/cache"));
    assert!(!plan.overwrites);
    assert_eq!(plan.context.module, "example.com/app");
    assert!(!project.path().join("vpkg").exists());
    assert_eq!(server.hits("official/templates/client.go.tmpl"), 0);
    Ok(())
}

#[tokio::test]
async fn test_explicit_destination() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    installer
        .install(
            "acme/cache",
            &InstallOptions {
                destination: Some("vpkg/internal/cache".into()),
                ..Default::default()
            },
        )
        .await?;

    let dest = project.path().join("vpkg/internal/cache");
    assert_eq!(fs::read_to_string(dest.join("client.go"))?, EXPECTED_CLIENT);
    let record = InstalledPackageRecord::load_from_path(&dest.join("meta.yaml"))?;
    assert_eq!(record.path, "vpkg/internal/cache");
    Ok(())
}

#[tokio::test]
async fn test_explicit_destination_outside_install_root_is_refused() -> Result<()> {
    let (server, project, installer) = setup().await?;

    let err = installer
        .install(
            "acme/cache",
            &InstallOptions {
                destination: Some("internal/cache".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!project.path().join("internal").exists());
    assert_eq!(server.hits("official/templates/client.go.tmpl"), 0);
    Ok(())
}

#[tokio::test]
async fn test_hinted_install_is_listed_and_removable() -> Result<()> {
    let (server, project, installer) = setup().await?;
    server.set(
        "official/meta.yaml",
        format!("{CACHE_MANIFEST}    destination: internal/cache\n"),
    );

    let receipt = installed(installer.install("acme/cache", &InstallOptions::default()).await?);
    let dest = project.path().join("vpkg/internal/cache");
    assert_eq!(receipt.destination, dest);
    assert!(!project.path().join("internal").exists());

    let settings = Settings::default();
    let index = InstalledIndex::scan(&project.path().join("vpkg"), &settings.metadata_file)?;
    let names: Vec<_> = index.all().iter().map(|p| p.record.name.clone()).collect();
    assert_eq!(names, vec!["acme/cache".to_string()]);
    assert_eq!(index.get("acme/cache").map(|p| p.dir.clone()), Some(dest.clone()));

    let removed = Uninstaller::new(project.path(), &settings).remove("acme/cache", false)?;
    assert_eq!(removed.path, dest);
    assert!(!dest.exists());
    Ok(())
}

#[tokio::test]
async fn test_listed_names_cannot_escape_the_destination() -> Result<()> {
    let (server, project, installer) = setup().await?;
    server.set(
        "api/repos/acme/official/contents/templates",
        listing_json(&[
            ("client.go.tmpl", "file"),
            ("../../../escaped.txt", "file"),
            ("nested/../../up.txt", "file"),
            ("README.md", "file"),
        ]),
    );
    server.set("escaped.txt", "outside");
    server.set("up.txt", "outside");

    let receipt = installed(installer.install("acme/cache", &InstallOptions::default()).await?);
    let mut files: Vec<_> = receipt.files.iter().map(|f| f.path.as_str()).collect();
    files.sort();
    assert_eq!(files, vec!["README.md", "client.go"]);
    assert!(!project.path().join("escaped.txt").exists());
    assert!(!project.path().join("vpkg/escaped.txt").exists());
    assert!(!project.path().join("vpkg/acme/up.txt").exists());
    Ok(())
}

#[tokio::test]
async fn test_template_shadowing_install_record_is_rejected() -> Result<()> {
    let (server, project, installer) = setup().await?;
    server.set(
        "api/repos/acme/official/contents/templates",
        listing_json(&[("client.go.tmpl", "file"), ("meta.yaml.tmpl", "file")]),
    );
    server.set("official/templates/meta.yaml.tmpl", "name: {{.VpkgName}}\n");

    let err = installer
        .install("acme/cache", &InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.to_string().contains("acme/cache"));
    assert!(!project.path().join("vpkg").exists());
    assert_eq!(server.hits("official/templates/meta.yaml.tmpl"), 0);
    Ok(())
}

#[tokio::test]
async fn test_render_failure_leaves_destination_untouched() -> Result<()> {
    let (server, project, installer) = setup().await?;
    server.set("official/templates/client.go.tmpl", "package {{.Nope}}\n");

    let err = installer
        .install("acme/cache", &InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(err.to_string().contains("client.go.tmpl"));

    let parent = project.path().join("vpkg/acme");
    assert!(!parent.join("cache").exists());
    let leftovers: Vec<_> = fs::read_dir(&parent)?
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_file_fails_with_not_found() -> Result<()> {
    let (server, project, installer) = setup().await?;
    server.remove("official/templates/README.md");

    let err = installer
        .install("acme/cache", &InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!project.path().join("vpkg/acme/cache").exists());
    Ok(())
}

#[tokio::test]
async fn test_unknown_package_fails_before_any_write() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    let err = installer
        .install("acme/nope", &InstallOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!project.path().join("vpkg").exists());
    Ok(())
}

#[tokio::test]
async fn test_spawned_install_reports_ordered_progress() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    let mut handle = spawn_install(installer, "acme/cache".to_string(), InstallOptions::default());
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    let outcome = handle.wait().await?;
    assert!(matches!(outcome, InstallOutcome::Installed(_)));

    let steps: Vec<_> = events.iter().map(|e| e.step.index()).collect();
    assert_eq!(steps.first(), Some(&InstallStep::Discovery.index()));
    assert_eq!(steps.last(), Some(&InstallStep::Install.index()));
    assert!(events.iter().all(|e| e.error.is_none()));
    assert!(events.iter().any(|e| e.files.map(|f| f.total) == Some(2)));
    assert!(project.path().join("vpkg/acme/cache/client.go").exists());
    Ok(())
}

#[tokio::test]
async fn test_cancelled_install_writes_nothing() -> Result<()> {
    let (_server, project, installer) = setup().await?;

    let handle = spawn_install(installer, "acme/cache".to_string(), InstallOptions::default());
    handle.cancel.cancel();
    let result = handle.wait().await;

    match result {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::Cancelled);
            assert!(!project.path().join("vpkg/acme/cache").exists());
        }
        // The task may finish before it observes the token
        Ok(outcome) => assert!(matches!(outcome, InstallOutcome::Installed(_))),
    }
    Ok(())
}
