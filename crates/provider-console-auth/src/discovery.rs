//! Discovery of available authentication methods.
//!
//! Runs once at startup. Each mechanism found is appended once, in priority
//! order, and the manual fallback always closes the list.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::process::{CommandSpec, ProcessRunner};

/// The kind of mechanism an [`AuthMethod`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// Client binary at a known install path.
    DirectBinary,
    /// Client binary resolved through `PATH`.
    DirectCommand,
    /// Client binary found by searching the filesystem.
    FilesystemSearch,
    /// Client binary at an alternate install location.
    BuiltinBinary,
    /// Client image run through the container runtime CLI.
    RuntimeFallback,
    /// Client binary at a platform-specific path.
    PlatformSpecific,
    /// Credential files written locally from the code itself.
    ManualFallback,
}

impl MethodKind {
    /// Returns the stable snake_case name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DirectBinary => "direct_binary",
            Self::DirectCommand => "direct_command",
            Self::FilesystemSearch => "filesystem_search",
            Self::BuiltinBinary => "builtin_binary",
            Self::RuntimeFallback => "runtime_fallback",
            Self::PlatformSpecific => "platform_specific",
            Self::ManualFallback => "manual_fallback",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered authentication mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethod {
    /// Mechanism kind.
    pub kind: MethodKind,
    /// Binary path, runtime CLI name, or `manual`.
    pub locator: String,
}

impl AuthMethod {
    /// Create a method.
    #[must_use]
    pub fn new(kind: MethodKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }

    /// The always-available manual fallback.
    #[must_use]
    pub fn manual() -> Self {
        Self::new(MethodKind::ManualFallback, "manual")
    }
}

/// Where and how to look for authentication mechanisms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// File name of the client binary.
    pub binary_name: String,
    /// Known install paths, checked first.
    pub known_paths: Vec<PathBuf>,
    /// Alternate install locations.
    pub builtin_paths: Vec<PathBuf>,
    /// Platform-specific paths.
    pub platform_paths: Vec<PathBuf>,
    /// Search path used instead of `PATH`, if set.
    pub search_path: Option<String>,
    /// Root of the filesystem-wide search; `None` disables the search.
    pub search_root: Option<PathBuf>,
    /// Hard bound on the filesystem search.
    pub search_timeout: Duration,
    /// Container runtime CLI probed for the sandboxed fallback.
    pub runtime_cli: String,
    /// Bound on the runtime CLI version check.
    pub runtime_check_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let paths = |list: &[&str]| -> Vec<PathBuf> { list.iter().map(PathBuf::from).collect() };
        Self {
            binary_name: "urnetwork".to_string(),
            known_paths: paths(&[
                "/usr/local/bin/urnetwork",
                "/usr/bin/urnetwork",
                "/opt/urnetwork/urnetwork",
                "/addon/urnetwork",
                "/app/urnetwork",
                "/root/urnetwork",
                "/bin/urnetwork",
            ]),
            builtin_paths: paths(&[
                "/opt/bringyour/urnetwork",
                "/app/bringyour/urnetwork",
                "/usr/local/bringyour/urnetwork",
                "/run/s6/services/urnetwork/run",
                "/etc/services.d/urnetwork/run",
            ]),
            platform_paths: paths(&[
                "/usr/share/hassio/urnetwork",
                "/data/urnetwork",
                "/config/urnetwork",
            ]),
            search_path: None,
            search_root: Some(PathBuf::from("/")),
            search_timeout: Duration::from_secs(30),
            runtime_cli: "docker".to_string(),
            runtime_check_timeout: Duration::from_secs(10),
        }
    }
}

/// Returns true if `path` is a regular file with an execute bit set.
#[must_use]
pub fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Accumulates methods, suppressing duplicate paths.
struct MethodList {
    methods: Vec<AuthMethod>,
    seen: HashSet<PathBuf>,
}

impl MethodList {
    fn new() -> Self {
        Self {
            methods: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn push_path(&mut self, kind: MethodKind, path: &Path) {
        let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.seen.insert(resolved) {
            debug!(kind = %kind, path = %path.display(), "Skipping duplicate binary");
            return;
        }
        info!(kind = %kind, path = %path.display(), "Found authentication method");
        self.methods
            .push(AuthMethod::new(kind, path.display().to_string()));
    }

    fn probe_paths(&mut self, kind: MethodKind, paths: &[PathBuf]) {
        for path in paths {
            if is_executable_file(path) {
                self.push_path(kind, path);
            } else if path.exists() {
                debug!(path = %path.display(), "Candidate is not an executable file");
            }
        }
    }
}

/// Discover the available authentication methods, in priority order.
///
/// The result always ends with [`MethodKind::ManualFallback`].
pub async fn discover(config: &DiscoveryConfig, runner: &dyn ProcessRunner) -> Vec<AuthMethod> {
    let mut list = MethodList::new();

    list.probe_paths(MethodKind::DirectBinary, &config.known_paths);

    let resolved = match &config.search_path {
        Some(paths) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            which::which_in(&config.binary_name, Some(paths), cwd)
        }
        None => which::which(&config.binary_name),
    };
    match resolved {
        Ok(path) => list.push_path(MethodKind::DirectCommand, &path),
        Err(e) => debug!(binary = %config.binary_name, error = %e, "Binary not on search path"),
    }

    if let Some(root) = &config.search_root {
        let spec = CommandSpec::new(
            "find",
            [
                root.display().to_string(),
                "-name".to_string(),
                config.binary_name.clone(),
                "-type".to_string(),
                "f".to_string(),
                "-executable".to_string(),
            ],
        )
        .timeout(config.search_timeout);

        match runner.run(&spec).await {
            // `find` exits non-zero on unreadable directories; its hits are still valid.
            Ok(output) => {
                for line in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    list.push_path(MethodKind::FilesystemSearch, Path::new(line));
                }
            }
            Err(e) => warn!(error = %e, "Filesystem search failed"),
        }
    }

    list.probe_paths(MethodKind::BuiltinBinary, &config.builtin_paths);

    let version = CommandSpec::new(config.runtime_cli.clone(), ["--version"])
        .timeout(config.runtime_check_timeout);
    match runner.run(&version).await {
        Ok(output) if output.success() => {
            info!(cli = %config.runtime_cli, version = %output.stdout.trim(), "Container runtime available for fallback");
            list.methods.push(AuthMethod::new(
                MethodKind::RuntimeFallback,
                config.runtime_cli.clone(),
            ));
        }
        Ok(output) => debug!(cli = %config.runtime_cli, exit_code = ?output.exit_code, "Container runtime CLI unusable"),
        Err(e) => debug!(cli = %config.runtime_cli, error = %e, "Container runtime CLI unavailable"),
    }

    list.probe_paths(MethodKind::PlatformSpecific, &config.platform_paths);

    list.methods.push(AuthMethod::manual());

    info!(
        methods = ?list.methods.iter().map(|m| m.kind.as_str()).collect::<Vec<_>>(),
        "Authentication method discovery complete"
    );
    list.methods
}
