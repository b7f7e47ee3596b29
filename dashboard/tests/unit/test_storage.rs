//! Registry, status, error log and environment file tests

use deckhand::deploy::fsm::{DeploymentStep, StepStatus};
use deckhand::errors::DashboardError;
use deckhand::storage::deployment_status::StatusStore;
use deckhand::storage::env_file::EnvStore;
use deckhand::storage::error_log::{ErrorLog, NewErrorEntry, MAX_ERROR_ENTRIES};
use deckhand::storage::registry::{NewApp, Registry};
use openapi_server::models::ErrorCategory;

use crate::support::{layout, write_discovered_app};

fn new_app(name: &str) -> NewApp {
    NewApp {
        name: name.to_string(),
        repository: format!("https://example.com/{}.git", name),
        branch: "main".to_string(),
        port: 3000,
    }
}

#[tokio::test]
async fn test_registry_create_get_delete() {
    let root = tempfile::tempdir().unwrap();
    let registry = Registry::new(layout(&root));

    assert!(registry.list().await.is_empty());

    let shop = registry.create(new_app("shop")).await.unwrap();
    let blog = registry.create(new_app("blog")).await.unwrap();
    assert_ne!(shop.id, blog.id);
    assert_eq!(registry.get_by_name("shop").await.unwrap().id, shop.id);
    assert_eq!(registry.get_by_id(&blog.id).await.unwrap().name, "blog");

    registry.update_pm2_id(&shop.id, 4).await.unwrap();
    assert_eq!(registry.get_by_id(&shop.id).await.unwrap().pm2_id, Some(4));

    registry.delete(&shop.id).await.unwrap();
    assert!(registry.get_by_id(&shop.id).await.is_none());
    assert_eq!(registry.list().await.len(), 1);
}

#[tokio::test]
async fn test_registry_rejects_duplicate_name() {
    let root = tempfile::tempdir().unwrap();
    let registry = Registry::new(layout(&root));

    registry.create(new_app("shop")).await.unwrap();
    let err = registry.create(new_app("shop")).await.unwrap_err();
    assert!(matches!(err, DashboardError::Conflict(_)));
    assert_eq!(registry.list().await.len(), 1);
}

#[tokio::test]
async fn test_registry_replace_drops_same_name() {
    let root = tempfile::tempdir().unwrap();
    let registry = Registry::new(layout(&root));

    let old = registry.create(new_app("shop")).await.unwrap();
    registry.create(new_app("blog")).await.unwrap();

    let (dropped, fresh) = registry.replace(new_app("shop")).await.unwrap();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].id, old.id);
    assert_ne!(fresh.id, old.id);

    let names: Vec<_> = registry.list().await.into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["blog", "shop"]);
}

#[tokio::test]
async fn test_registry_survives_corrupt_file() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    std::fs::create_dir_all(&layout.apps_dir).unwrap();
    std::fs::write(layout.registry_file().path(), "{not json").unwrap();

    let registry = Registry::new(layout);
    assert!(registry.list().await.is_empty());
}

#[tokio::test]
async fn test_status_store_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let store = StatusStore::new(layout(&root));

    store.initialize("shop").await.unwrap();
    let status = store.get("shop").await;
    assert_eq!(status.steps.get(DeploymentStep::Cloning), StepStatus::Pending);

    for step in DeploymentStep::ALL {
        store.update("shop", step, StepStatus::Success, None).await.unwrap();
    }
    let status = store.get("shop").await;
    assert!(status.is_complete());
    assert!(status.completed_at.is_some());
    assert!(status.error.is_none());

    store.clear("shop").await.unwrap();
    let status = store.get("shop").await;
    assert!(status.completed_at.is_none());
    assert_eq!(status.steps.get(DeploymentStep::Starting), StepStatus::Pending);
}

#[tokio::test]
async fn test_status_store_records_error_message() {
    let root = tempfile::tempdir().unwrap();
    let store = StatusStore::new(layout(&root));

    store.initialize("shop").await.unwrap();
    let status = store
        .update("shop", DeploymentStep::Installing, StepStatus::Error, Some("npm ERR! 404"))
        .await
        .unwrap();
    let error = status.error.unwrap();
    assert_eq!(error.step, DeploymentStep::Installing);
    assert_eq!(error.message, "npm ERR! 404");
    assert_eq!(status.current_step, DeploymentStep::Installing);
}

#[tokio::test]
async fn test_error_log_newest_first_and_capped() {
    let root = tempfile::tempdir().unwrap();
    let log = ErrorLog::new(layout(&root));

    for i in 0..MAX_ERROR_ENTRIES + 5 {
        log.append(
            "shop",
            NewErrorEntry::new(ErrorCategory::Build, "Build Failed", format!("attempt {}", i)),
        )
        .await
        .unwrap();
    }

    let entries = log.list("shop").await;
    assert_eq!(entries.len(), MAX_ERROR_ENTRIES);
    assert_eq!(entries[0].message, format!("attempt {}", MAX_ERROR_ENTRIES + 4));
    assert_eq!(entries.last().unwrap().message, "attempt 5");

    log.clear("shop").await.unwrap();
    assert!(log.list("shop").await.is_empty());
}

#[tokio::test]
async fn test_error_log_concurrent_appends() {
    let root = tempfile::tempdir().unwrap();
    let log = ErrorLog::new(layout(&root));

    let mut handles = Vec::new();
    for i in 0..20 {
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            log.append(
                "shop",
                NewErrorEntry::new(ErrorCategory::Runtime, "Crash", format!("crash {}", i)),
            )
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(log.list("shop").await.len(), 20);
}

#[tokio::test]
async fn test_env_store_set_replace_delete() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    write_discovered_app(&layout, "blog");
    let store = EnvStore::new(layout.clone());

    store.set("blog", "PORT", "4000").await.unwrap();
    store.set("blog", "NODE_ENV", "production").await.unwrap();
    store.set("blog", "PORT", "5000").await.unwrap();

    let vars = store.list("blog").await;
    assert_eq!(vars.len(), 2);
    assert_eq!(vars[0].key, "PORT");
    assert_eq!(vars[0].value, "5000");

    store.delete("blog", "PORT").await.unwrap();
    let vars = store.list("blog").await;
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].key, "NODE_ENV");

    let contents = std::fs::read_to_string(layout.env_file("blog").path()).unwrap();
    assert!(!contents.contains("PORT="));
}

#[tokio::test]
async fn test_env_store_replaces_assignment_written_with_spaces() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    write_discovered_app(&layout, "blog");
    let env_file = layout.env_file("blog");
    std::fs::write(env_file.path(), "PORT = 3000\nNODE_ENV=production\n").unwrap();
    let store = EnvStore::new(layout);

    store.set("blog", "PORT", "4000").await.unwrap();
    let ports: Vec<_> = store
        .list("blog")
        .await
        .into_iter()
        .filter(|v| v.key == "PORT")
        .collect();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].value, "4000");

    std::fs::write(env_file.path(), "PORT = 3000\nNODE_ENV=production\n").unwrap();
    store.delete("blog", "PORT").await.unwrap();
    let vars = store.list("blog").await;
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].key, "NODE_ENV");
}

#[tokio::test]
async fn test_env_store_links_existing_ecosystem_config() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    write_discovered_app(&layout, "blog");
    let config = layout.apps_dir.join("blog").join("ecosystem.config.js");
    std::fs::write(
        &config,
        "module.exports = {\n  apps: [{\n    name: 'blog',\n    script: 'npm'\n  }]\n}\n",
    )
    .unwrap();

    let store = EnvStore::new(layout);
    store.set("blog", "API_KEY", "abc").await.unwrap();

    let contents = std::fs::read_to_string(&config).unwrap();
    assert!(contents.contains("env_file"));
    assert!(contents.contains("name: 'blog'"));
}

#[tokio::test]
async fn test_env_store_rejects_invalid_key() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    write_discovered_app(&layout, "blog");
    let store = EnvStore::new(layout);

    let err = store.set("blog", "BAD KEY", "x").await.unwrap_err();
    assert!(matches!(err, DashboardError::Validation(_)));
    assert!(store.list("blog").await.is_empty());
}

#[tokio::test]
async fn test_env_store_delete_without_file() {
    let root = tempfile::tempdir().unwrap();
    let store = EnvStore::new(layout(&root));
    store.delete("ghost", "PORT").await.unwrap();
}
