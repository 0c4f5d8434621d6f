//! Executable resolution for server commands.
//!
//! Looks the command up on the search path first. Node.js tooling is often
//! installed somewhere a GUI-launched or minimal environment does not put on
//! `PATH` (nvm, npm's global prefix, Homebrew), so those names get a second
//! pass over well-known install roots.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Commands that are worth probing outside the search path.
pub const NODE_TOOLS: &[&str] = &["node", "npm", "npx"];

/// The package runner that most published MCP servers are launched with.
pub const NODE_PACKAGE_RUNNER: &str = "npx";

/// A logical command name mapped to a concrete, runnable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutable {
    pub logical_name: String,
    pub absolute_path: PathBuf,
}

/// Maps command names to executables.
///
/// Holds no cache: every call is a fresh look at the filesystem, so a
/// resolver can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct Resolver {
    search_path: Option<OsString>,
    home: Option<PathBuf>,
    system_dirs: Vec<PathBuf>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Resolver {
    /// Resolver over the process `PATH` and the current user's home directory.
    pub fn from_env() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
            home: dirs_next::home_dir(),
            system_dirs: vec![
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/opt/homebrew/bin"),
            ],
        }
    }

    /// Replace the search path (same syntax as `PATH`).
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Replace the package-manager prefixes probed last, in order.
    pub fn with_system_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.system_dirs = dirs;
        self
    }

    /// Resolve `name` to an executable, or `None` if nothing runnable exists.
    pub fn resolve(&self, name: &str) -> Option<ResolvedExecutable> {
        if let Some(path) = self.search(name) {
            tracing::debug!("Resolved '{name}' on search path: {}", path.display());
            return Some(ResolvedExecutable {
                logical_name: name.to_string(),
                absolute_path: path,
            });
        }

        if !NODE_TOOLS.contains(&name) {
            return None;
        }

        let found = self
            .fallback_candidates(name)
            .into_iter()
            .find(|candidate| candidate.is_file())?;
        tracing::debug!("Resolved '{name}' from install root: {}", found.display());
        Some(ResolvedExecutable {
            logical_name: name.to_string(),
            absolute_path: found,
        })
    }

    fn search(&self, name: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let path = which::which_in(name, self.search_path.as_ref(), &cwd).ok()?;
        if path.is_absolute() {
            Some(path)
        } else {
            Some(cwd.join(path))
        }
    }

    /// Candidate locations for a Node.js tool, in probe order.
    fn fallback_candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(home) = &self.home {
            candidates.extend(nvm_candidates(home, name));
            candidates.push(home.join("node_modules").join(".bin").join(name));
            candidates.push(home.join(".npm-global").join("bin").join(name));
        }

        candidates.extend(self.system_dirs.iter().map(|dir| dir.join(name)));
        candidates
    }
}

/// `~/.nvm/versions/node/<version>/bin/<name>` for every installed version,
/// in directory listing order.
fn nvm_candidates(home: &Path, name: &str) -> Vec<PathBuf> {
    let versions = home.join(".nvm").join("versions").join("node");
    let Ok(entries) = std::fs::read_dir(&versions) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|dir| dir.join("bin").join(name))
        .collect()
}

/// Remediation hint for a command that could not be resolved.
pub fn missing_command_hint(name: &str) -> Option<String> {
    (name == NODE_PACKAGE_RUNNER).then(|| {
        "Node.js may not be installed or properly configured. \
         Install Node.js from https://nodejs.org"
            .to_string()
    })
}
