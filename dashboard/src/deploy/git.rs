//! Git checkout of an application

use std::path::Path;

use crate::deploy::command::CommandSpec;

/// `git clone -b <branch> <repository> <dir>`
pub fn clone(repository: &str, branch: &str, target_dir: &Path) -> CommandSpec {
    CommandSpec::new("git")
        .args(["clone", "-b", branch, repository])
        .arg(target_dir.to_string_lossy())
        .require_prefix("git")
}
