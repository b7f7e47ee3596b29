//! Shared test helpers

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deckhand::deploy::command::{CommandRunner, CommandSpec, ExecResult};
use deckhand::storage::layout::StorageLayout;

type Responder = Box<dyn Fn(&CommandSpec) -> ExecResult + Send + Sync>;

/// Records every command line and answers with `responder`
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    responder: Responder,
}

impl FakeRunner {
    pub fn new(responder: impl Fn(&CommandSpec) -> ExecResult + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
        })
    }

    /// Clone writes a manifest, `pm2 jlist` reports `processes`, everything else succeeds
    pub fn healthy(processes: &'static str) -> Arc<Self> {
        Self::new(move |spec| match spec.program.as_str() {
            "git" => {
                fake_clone(spec);
                ExecResult::ok("")
            }
            "pm2" if spec.args.first().map(String::as_str) == Some("jlist") => {
                ExecResult::ok(processes)
            }
            _ => ExecResult::ok(""),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> ExecResult {
        self.calls.lock().unwrap().push(spec.command_line());
        (self.responder)(spec)
    }
}

pub const MANIFEST: &str = r#"{
  "name": "shop",
  "version": "1.0.0",
  "scripts": { "start": "node index.js", "build": "tsc" }
}"#;

/// Stand-in for `git clone`: the target directory is the last argument
pub fn fake_clone(spec: &CommandSpec) {
    let target = Path::new(spec.args.last().unwrap());
    std::fs::create_dir_all(target).unwrap();
    std::fs::write(target.join("package.json"), MANIFEST).unwrap();
}

pub fn layout(root: &tempfile::TempDir) -> StorageLayout {
    StorageLayout::new(root.path().join("apps"))
}

/// An application directory that was never deployed through the dashboard
pub fn write_discovered_app(layout: &StorageLayout, name: &str) {
    let dir = layout.apps_dir.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("package.json"), MANIFEST.replace("shop", name)).unwrap();
}
