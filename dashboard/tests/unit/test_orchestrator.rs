//! Deployment orchestrator tests with a scripted command runner

use deckhand::deploy::command::{CommandSpec, ExecResult};
use deckhand::deploy::fsm::{DeploymentStep, StepStatus};
use deckhand::deploy::orchestrator::Orchestrator;
use deckhand::errors::DashboardError;
use deckhand::storage::deployment_status::StatusStore;
use deckhand::storage::error_log::ErrorLog;
use deckhand::storage::registry::{NewApp, Registry};
use openapi_server::models::ErrorCategory;

use crate::support::{fake_clone, layout, FakeRunner};

const SHOP_PROCESS: &str = r#"[{"pm_id":7,"name":"shop","pm2_env":{"status":"online"}}]"#;

fn shop() -> NewApp {
    NewApp {
        name: "shop".to_string(),
        repository: "https://example.com/shop.git".to_string(),
        branch: "main".to_string(),
        port: 4100,
    }
}

fn is(spec: &CommandSpec, program: &str, first_arg: &str) -> bool {
    spec.program == program && spec.args.first().map(String::as_str) == Some(first_arg)
}

#[tokio::test]
async fn test_successful_deployment() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::healthy(SHOP_PROCESS);
    let orchestrator = Orchestrator::new(layout.clone(), runner.clone());

    let summary = orchestrator.deploy(shop()).await.unwrap();

    assert_eq!(summary.status, "online");
    assert!(!summary.has_errors);
    assert_eq!(summary.port, 4100);

    let record = Registry::new(layout.clone()).get_by_name("shop").await.unwrap();
    assert_eq!(record.id, summary.id);
    assert_eq!(record.pm2_id, Some(7));

    let status = StatusStore::new(layout.clone()).get("shop").await;
    for step in DeploymentStep::ALL {
        assert_eq!(status.steps.get(step), StepStatus::Success, "{}", step);
    }
    assert!(status.completed_at.is_some());
    assert!(status.error.is_none());
    assert!(ErrorLog::new(layout.clone()).list("shop").await.is_empty());

    let app_dir = layout.apps_dir.join("shop");
    let calls = runner.calls();
    assert!(calls[0].starts_with("git clone -b main https://example.com/shop.git"));
    assert!(runner.ran(&format!("npm install --production --prefix {}", app_dir.display())));
    assert!(runner.ran(&format!("npm run build --prefix {}", app_dir.display())));
    assert!(runner.ran("pm2 start"));
    assert_eq!(calls.last().unwrap(), "pm2 save");

    let config = std::fs::read_to_string(app_dir.join("ecosystem.config.js")).unwrap();
    assert!(config.contains("4100"));
    assert!(config.contains("\"shop\""));
}

#[tokio::test]
async fn test_clone_failure_still_starts_placeholder() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::new(|spec| {
        if spec.program == "git" {
            ExecResult::failed("fatal: repository not found")
        } else if is(spec, "pm2", "start") {
            ExecResult::failed("Script exited with code 1")
        } else {
            ExecResult::ok("")
        }
    });
    let orchestrator = Orchestrator::new(layout.clone(), runner.clone());

    let summary = orchestrator.deploy(shop()).await.unwrap();

    assert_eq!(summary.status, "error");
    assert!(summary.has_errors);
    assert!(!runner.ran("npm"));
    assert!(runner.ran("pm2 start"));
    assert_eq!(runner.calls().last().unwrap(), "pm2 save");

    let status = StatusStore::new(layout.clone()).get("shop").await;
    for step in DeploymentStep::ALL {
        assert_eq!(status.steps.get(step), StepStatus::Error, "{}", step);
    }
    assert!(status.completed_at.is_some());
    assert_eq!(status.error.unwrap().step, DeploymentStep::Starting);

    let errors = ErrorLog::new(layout.clone()).list("shop").await;
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].title, "PM2 Start Failed");
    assert_eq!(errors[0].category, ErrorCategory::Runtime);
    assert_eq!(errors[1].title, "Git Clone Failed");
    assert_eq!(errors[1].category, ErrorCategory::Deployment);
    assert_eq!(errors[1].details.as_deref(), Some("fatal: repository not found"));

    let manifest = std::fs::read_to_string(layout.apps_dir.join("shop").join("package.json")).unwrap();
    assert!(manifest.contains("exit 1"));

    // the record stays so the failure is visible in the dashboard
    let record = Registry::new(layout).get_by_name("shop").await.unwrap();
    assert_eq!(record.pm2_id, None);
}

#[tokio::test]
async fn test_skipped_steps_carry_clone_failure_reason() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::new(|spec| {
        if spec.program == "git" {
            ExecResult::failed("fatal: could not read Username")
        } else {
            ExecResult::ok("[]")
        }
    });
    let orchestrator = Orchestrator::new(layout.clone(), runner);

    let summary = orchestrator.deploy(shop()).await.unwrap();
    assert!(summary.has_errors);

    let status = StatusStore::new(layout).get("shop").await;
    assert_eq!(status.steps.get(DeploymentStep::Cloning), StepStatus::Error);
    assert_eq!(status.steps.get(DeploymentStep::Installing), StepStatus::Error);
    assert_eq!(status.steps.get(DeploymentStep::Building), StepStatus::Error);
    assert_eq!(status.steps.get(DeploymentStep::Starting), StepStatus::Success);
    let error = status.error.unwrap();
    assert_eq!(error.step, DeploymentStep::Building);
    assert_eq!(error.message, "Skipped due to clone failure");
}

#[tokio::test]
async fn test_build_failure_uses_stdout_details() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::new(|spec| {
        if spec.program == "git" {
            fake_clone(spec);
            ExecResult::ok("")
        } else if is(spec, "npm", "run") {
            ExecResult {
                success: false,
                stdout: "src/index.ts(3,1): error TS2322".to_string(),
                ..Default::default()
            }
        } else if is(spec, "pm2", "jlist") {
            ExecResult::ok(SHOP_PROCESS)
        } else {
            ExecResult::ok("")
        }
    });
    let orchestrator = Orchestrator::new(layout.clone(), runner);

    let summary = orchestrator.deploy(shop()).await.unwrap();
    assert!(summary.has_errors);

    let status = StatusStore::new(layout.clone()).get("shop").await;
    assert_eq!(status.steps.get(DeploymentStep::Installing), StepStatus::Success);
    assert_eq!(status.steps.get(DeploymentStep::Building), StepStatus::Error);
    assert_eq!(status.steps.get(DeploymentStep::Starting), StepStatus::Success);

    let errors = ErrorLog::new(layout.clone()).list("shop").await;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].title, "Build Failed");
    assert_eq!(errors[0].category, ErrorCategory::Build);
    assert_eq!(errors[0].details.as_deref(), Some("src/index.ts(3,1): error TS2322"));

    // started anyway, so the id is known
    let record = Registry::new(layout).get_by_name("shop").await.unwrap();
    assert_eq!(record.pm2_id, Some(7));
}

#[tokio::test]
async fn test_redeploy_replaces_previous_process() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::healthy(SHOP_PROCESS);
    let orchestrator = Orchestrator::new(layout.clone(), runner.clone());

    let first = orchestrator.deploy(shop()).await.unwrap();
    let second = orchestrator.deploy(shop()).await.unwrap();

    assert_ne!(first.id, second.id);
    assert!(runner.ran("pm2 delete 7"));

    let records = Registry::new(layout).list().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, second.id);
}

#[tokio::test]
async fn test_rejects_concurrent_deployment_of_same_name() {
    let root = tempfile::tempdir().unwrap();
    let layout = layout(&root);
    let runner = FakeRunner::healthy(SHOP_PROCESS);
    let orchestrator = Orchestrator::new(layout.clone(), runner.clone());

    let _ticket = orchestrator.guard().acquire("shop").unwrap();
    let err = orchestrator.deploy(shop()).await.unwrap_err();

    assert!(matches!(err, DashboardError::Conflict(_)));
    assert!(runner.calls().is_empty());
    assert!(Registry::new(layout).list().await.is_empty());
}

#[tokio::test]
async fn test_rejects_invalid_request_before_running_anything() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::healthy("[]");
    let orchestrator = Orchestrator::new(layout(&root), runner.clone());

    let mut app = shop();
    app.name = "../escape".to_string();
    let err = orchestrator.deploy(app).await.unwrap_err();

    assert!(matches!(err, DashboardError::Validation(_)));
    assert!(runner.calls().is_empty());
}
