//! Credential probes: one strategy per discovered authentication method.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use provider_console_core::Clock;
use provider_console_store::schema::{files, CLIENT_CONFIG_MOUNT};
use provider_console_store::{CredentialStore, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::discovery::{AuthMethod, MethodKind};
use crate::process::{CommandOutput, CommandSpec, ProcessError, ProcessRunner};

/// Output phrases the client prints when it has stored a token.
pub const SUCCESS_PHRASES: [&str; 3] = ["jwt written", "authentication successful", "login successful"];

/// Method name recorded when the sandboxed client claims success without files.
pub const UNVERIFIED_METHOD: &str = "runtime_fallback_unverified";

/// Minimum code length accepted by the manual fallback.
pub const MANUAL_MIN_LENGTH: usize = 50;

/// Why a probe did not authenticate.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The client ran but did not report success.
    #[error("client rejected the code: {0}")]
    Rejected(String),

    /// The client reported success but no credential file appeared.
    #[error("no credential files were written")]
    NoCredentials,

    /// The code is too short for the manual fallback.
    #[error("code too short for manual authentication ({actual} < {min} characters)")]
    TooShort {
        /// Required length.
        min: usize,
        /// Submitted length.
        actual: usize,
    },

    /// The client could not be run.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The configuration directory could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A successful probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSuccess {
    /// Method name to record.
    pub method: String,
    /// Human-readable description.
    pub message: String,
}

impl ProbeSuccess {
    fn new(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            message: message.into(),
        }
    }
}

/// One way of turning an authentication code into credential files.
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    /// The method this probe implements.
    fn method(&self) -> &AuthMethod;

    /// Try to authenticate with `code`.
    ///
    /// # Errors
    ///
    /// Returns a `ProbeError` describing why no credentials were produced.
    async fn attempt(&self, code: &str) -> Result<ProbeSuccess, ProbeError>;
}

/// Delays and bounds used by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTimings {
    /// Bound on each direct client invocation.
    pub command_timeout: Duration,
    /// Bound on the sandboxed client run.
    pub sandbox_timeout: Duration,
    /// Wait between a direct client reporting success and checking for files.
    pub settle: Duration,
    /// Interval between sandbox file checks.
    pub poll_interval: Duration,
    /// Number of sandbox file checks.
    pub poll_attempts: u32,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(60),
            sandbox_timeout: Duration::from_secs(120),
            settle: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            poll_attempts: 10,
        }
    }
}

impl ProbeTimings {
    /// Timings with no waits, keeping the default process bounds.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            poll_interval: Duration::ZERO,
            ..Self::default()
        }
    }
}

fn summarize(output: &CommandOutput) -> String {
    let text = if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    };
    if text.is_empty() {
        format!("exit code {:?}", output.exit_code)
    } else {
        text.to_string()
    }
}

/// Runs a local client binary with the code.
pub struct DirectProbe {
    method: AuthMethod,
    store: Arc<dyn CredentialStore>,
    runner: Arc<dyn ProcessRunner>,
    timings: ProbeTimings,
}

impl DirectProbe {
    /// Create a probe for a direct-execution method.
    #[must_use]
    pub fn new(
        method: AuthMethod,
        store: Arc<dyn CredentialStore>,
        runner: Arc<dyn ProcessRunner>,
        timings: ProbeTimings,
    ) -> Self {
        Self {
            method,
            store,
            runner,
            timings,
        }
    }

    /// The argument shapes tried, in order.
    #[must_use]
    pub fn command_shapes(code: &str) -> Vec<Vec<String>> {
        [
            vec!["auth", code, "-f"],
            vec!["auth", code, "--force"],
            vec!["auth", code],
            vec!["login", code, "-f"],
            vec!["login", code],
        ]
        .into_iter()
        .map(|shape| shape.into_iter().map(str::to_string).collect())
        .collect()
    }
}

#[async_trait]
impl CredentialProbe for DirectProbe {
    fn method(&self) -> &AuthMethod {
        &self.method
    }

    async fn attempt(&self, code: &str) -> Result<ProbeSuccess, ProbeError> {
        let root = self.store.root();
        let home = root.parent().unwrap_or(root);
        let mut last_failure = String::from("no command shapes tried");

        for args in Self::command_shapes(code) {
            let spec = CommandSpec::new(self.method.locator.clone(), args)
                .timeout(self.timings.command_timeout)
                .working_dir(root)
                .env("HOME", home.display().to_string());
            info!(command = %spec.display_redacted(code), "Trying client command");

            let output = match self.runner.run(&spec).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(command = %spec.display_redacted(code), error = %e, "Client command failed");
                    last_failure = e.to_string();
                    continue;
                }
            };
            debug!(
                exit_code = ?output.exit_code,
                stdout = %output.stdout.trim(),
                stderr = %output.stderr.trim(),
                "Client command finished"
            );

            if output.success() || output.contains_any(&SUCCESS_PHRASES) {
                tokio::time::sleep(self.timings.settle).await;
                if self.store.has_credentials()? {
                    return Ok(ProbeSuccess::new(
                        self.method.kind.as_str(),
                        "Authenticated with the provider client",
                    ));
                }
                last_failure = "client reported success but wrote no credentials".to_string();
            } else {
                last_failure = summarize(&output);
            }
        }

        Err(ProbeError::Rejected(last_failure))
    }
}

/// Runs the client image in a disposable container with the configuration
/// directory mounted.
pub struct SandboxProbe {
    method: AuthMethod,
    image: String,
    store: Arc<dyn CredentialStore>,
    runner: Arc<dyn ProcessRunner>,
    timings: ProbeTimings,
    alternate_paths: Vec<PathBuf>,
    allow_unverified: bool,
}

impl SandboxProbe {
    /// Create a probe for the runtime fallback method.
    #[must_use]
    pub fn new(
        method: AuthMethod,
        image: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        runner: Arc<dyn ProcessRunner>,
        timings: ProbeTimings,
    ) -> Self {
        let alternate_paths = Self::default_alternate_paths(store.root());
        Self {
            method,
            image: image.into(),
            store,
            runner,
            timings,
            alternate_paths,
            allow_unverified: false,
        }
    }

    /// Replace the alternate token locations checked when no file appears.
    #[must_use]
    pub fn with_alternate_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.alternate_paths = paths;
        self
    }

    /// Accept a success claim that produced no credential files.
    #[must_use]
    pub fn allow_unverified(mut self, allow: bool) -> Self {
        self.allow_unverified = allow;
        self
    }

    /// Locations a misconfigured mount may have written the token to.
    #[must_use]
    pub fn default_alternate_paths(config_dir: &Path) -> Vec<PathBuf> {
        let parent = config_dir.parent().unwrap_or(config_dir);
        vec![
            parent.join(files::JWT),
            config_dir.join(files::JWT),
            Path::new(CLIENT_CONFIG_MOUNT).join(files::JWT),
            PathBuf::from("/tmp/.urnetwork").join(files::JWT),
        ]
    }

    /// Build the `run` command for `args`.
    #[must_use]
    pub fn run_command(&self, args: &[&str], timeout: Duration) -> CommandSpec {
        let mut argv = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{CLIENT_CONFIG_MOUNT}", self.store.root().display()),
            self.image.clone(),
        ];
        argv.extend(args.iter().map(ToString::to_string));
        CommandSpec::new(self.method.locator.clone(), argv).timeout(timeout)
    }

    fn verified(&self) -> ProbeSuccess {
        ProbeSuccess::new(
            self.method.kind.as_str(),
            "Authenticated with the sandboxed provider client",
        )
    }
}

#[async_trait]
impl CredentialProbe for SandboxProbe {
    fn method(&self) -> &AuthMethod {
        &self.method
    }

    async fn attempt(&self, code: &str) -> Result<ProbeSuccess, ProbeError> {
        let spec = self.run_command(&["auth", code, "-f"], self.timings.sandbox_timeout);
        info!(command = %spec.display_redacted(code), "Trying sandboxed client");

        let output = self.runner.run(&spec).await?;
        debug!(
            exit_code = ?output.exit_code,
            stdout = %output.stdout.trim(),
            stderr = %output.stderr.trim(),
            "Sandboxed client finished"
        );

        if !(output.success() || output.contains_any(&SUCCESS_PHRASES)) {
            return Err(ProbeError::Rejected(summarize(&output)));
        }

        for attempt in 1..=self.timings.poll_attempts {
            tokio::time::sleep(self.timings.poll_interval).await;
            if self.store.has_credentials()? {
                return Ok(self.verified());
            }
            debug!(attempt, max = self.timings.poll_attempts, "Waiting for credential files");
        }

        warn!("Sandboxed client reported success but no credential files appeared");
        for path in &self.alternate_paths {
            if !path.is_file() {
                continue;
            }
            match self.store.import_credential(path) {
                Ok(name) => {
                    info!(source = %path.display(), file = %name, "Recovered credential file from alternate path");
                    if self.store.has_credentials()? {
                        return Ok(self.verified());
                    }
                }
                Err(e) => warn!(source = %path.display(), error = %e, "Failed to import credential file"),
            }
        }

        if output.success() && output.stdout.to_lowercase().contains(SUCCESS_PHRASES[0]) {
            if self.allow_unverified {
                warn!("Accepting sandboxed authentication without credential files");
                return Ok(ProbeSuccess::new(
                    UNVERIFIED_METHOD,
                    "Authentication reported by the sandboxed client but no credential files were found",
                ));
            }
            warn!("Sandboxed client claimed success without credential files; unverified success is disabled");
        }

        Err(ProbeError::NoCredentials)
    }
}

/// Writes credential files derived from the code itself, without external
/// validation.
pub struct ManualProbe {
    method: AuthMethod,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    min_length: usize,
}

impl ManualProbe {
    /// Create the manual fallback probe.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            method: AuthMethod::manual(),
            store,
            clock,
            min_length: MANUAL_MIN_LENGTH,
        }
    }

    /// The base64 bundle written to the `jwt` file.
    #[must_use]
    pub fn token_bundle(code: &str, timestamp: f64) -> String {
        let prefix: String = code.chars().take(MANUAL_MIN_LENGTH).collect();
        let bundle = serde_json::json!({
            "auth_code": format!("{prefix}..."),
            "timestamp": timestamp,
            "method": "manual",
            "status": "authenticated",
        });
        base64::engine::general_purpose::STANDARD.encode(bundle.to_string())
    }
}

#[async_trait]
impl CredentialProbe for ManualProbe {
    fn method(&self) -> &AuthMethod {
        &self.method
    }

    async fn attempt(&self, code: &str) -> Result<ProbeSuccess, ProbeError> {
        let actual = code.chars().count();
        if actual < self.min_length {
            return Err(ProbeError::TooShort {
                min: self.min_length,
                actual,
            });
        }

        let jwt = Self::token_bundle(code, self.clock.unix_seconds());
        self.store.write_credential(files::JWT, jwt.as_bytes())?;
        let marker = format!("manual_auth_{}", self.clock.now().timestamp());
        self.store.write_credential(files::TOKEN, marker.as_bytes())?;
        info!("Manual credential files written");

        if self.store.has_credentials()? {
            Ok(ProbeSuccess::new(
                self.method.kind.as_str(),
                "Manual authentication recorded; the code was not validated",
            ))
        } else {
            Err(ProbeError::NoCredentials)
        }
    }
}

/// Everything needed to build probes.
#[derive(Clone)]
pub struct ProbeContext {
    /// Configuration directory.
    pub store: Arc<dyn CredentialStore>,
    /// Process runner.
    pub runner: Arc<dyn ProcessRunner>,
    /// Clock for manual bundles.
    pub clock: Arc<dyn Clock>,
    /// Image run by the sandboxed fallback.
    pub image: String,
    /// Delays and bounds.
    pub timings: ProbeTimings,
    /// Unverified-success policy for the sandboxed fallback.
    pub allow_unverified: bool,
}

/// Build the probe for `method`.
#[must_use]
pub fn build_probe(method: &AuthMethod, ctx: &ProbeContext) -> Box<dyn CredentialProbe> {
    match method.kind {
        MethodKind::RuntimeFallback => Box::new(
            SandboxProbe::new(
                method.clone(),
                ctx.image.clone(),
                Arc::clone(&ctx.store),
                Arc::clone(&ctx.runner),
                ctx.timings,
            )
            .allow_unverified(ctx.allow_unverified),
        ),
        MethodKind::ManualFallback => Box::new(ManualProbe::new(
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.clock),
        )),
        MethodKind::DirectBinary
        | MethodKind::DirectCommand
        | MethodKind::FilesystemSearch
        | MethodKind::BuiltinBinary
        | MethodKind::PlatformSpecific => Box::new(DirectProbe::new(
            method.clone(),
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.runner),
            ctx.timings,
        )),
    }
}
