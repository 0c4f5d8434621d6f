//! Node.js toolchain status, for servers launched through `npx`.

use crate::resolver::{NODE_TOOLS, Resolver};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether one tool is installed, and which version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn installed(&self) -> bool {
        self.path.is_some()
    }
}

/// Check `node`, `npm` and `npx`, probing versions concurrently.
pub async fn check_runtime(resolver: &Resolver) -> Vec<ToolStatus> {
    let checks = NODE_TOOLS.iter().map(|name| async move {
        let path = resolver.resolve(name).map(|exe| exe.absolute_path);
        let version = match &path {
            Some(path) => probe_version(path).await,
            None => None,
        };
        ToolStatus {
            name: name.to_string(),
            path,
            version,
        }
    });
    join_all(checks).await
}

/// Whether every Node.js tool needed by `npx`-launched servers is present.
pub fn runtime_complete(statuses: &[ToolStatus]) -> bool {
    statuses.iter().all(ToolStatus::installed)
}

/// Run `<path> --version` and return its trimmed stdout.
pub async fn probe_version(path: &Path) -> Option<String> {
    let output = tokio::time::timeout(
        VERSION_PROBE_TIMEOUT,
        Command::new(path).arg("--version").kill_on_drop(true).output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        tracing::debug!("{} --version exited with {}", path.display(), output.status);
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}
