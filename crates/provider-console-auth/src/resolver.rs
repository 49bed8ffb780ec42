//! The authentication resolver.
//!
//! Owns the discovered methods and their probes, serializes authentication
//! attempts, and answers "are we authenticated?" from the evidence on disk.

use std::sync::Arc;

use provider_console_core::Clock;
use provider_console_store::{CredentialFile, CredentialRecord, CredentialStore};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::discovery::{discover, AuthMethod, MethodKind};
use crate::error::{AuthError, Result};
use crate::probe::{build_probe, CredentialProbe, ProbeContext};
use crate::process::{CommandSpec, ProcessError, ProcessRunner};
use crate::AuthConfig;

/// Status-command output that indicates a stored, valid token.
const STATUS_PHRASES: [&str; 3] = ["authenticated", "logged in", "valid token"];

/// A successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    /// Name of the method that succeeded.
    pub method: String,
    /// Human-readable description.
    pub message: String,
    /// Credential files present afterwards.
    pub files: Vec<CredentialFile>,
}

/// Why the resolver considers the provider authenticated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Evidence {
    /// A well-known credential file is non-empty.
    CredentialFile {
        /// File name.
        name: String,
    },
    /// Some other non-empty file sits in the configuration directory.
    OtherFile {
        /// File name.
        name: String,
    },
    /// The metadata record is recent enough.
    FreshRecord {
        /// Method recorded.
        method: String,
        /// Seconds since the record was written.
        age_secs: f64,
    },
    /// The provider container reports `Up`.
    ContainerRunning,
    /// The sandboxed client's status command reports a valid token.
    SandboxStatus,
}

/// Authentication state as reported to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Result of the layered authentication check.
    pub authenticated: bool,
    /// Configuration directory.
    pub config_path: String,
    /// Every regular file in the directory, metadata included.
    pub files: Vec<CredentialFile>,
    /// The metadata record, if readable.
    pub last_info: Option<CredentialRecord>,
    /// Names of the discovered methods, in priority order.
    pub available_methods: Vec<String>,
}

/// Resolves authentication codes into credential files.
pub struct AuthResolver {
    config: AuthConfig,
    store: Arc<dyn CredentialStore>,
    runner: Arc<dyn ProcessRunner>,
    clock: Arc<dyn Clock>,
    methods: Vec<AuthMethod>,
    probes: Vec<Box<dyn CredentialProbe>>,
    lock: Mutex<()>,
}

impl AuthResolver {
    /// Discover the available methods and build a resolver over them.
    pub async fn discover(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        runner: Arc<dyn ProcessRunner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if let Err(e) = store.ensure_root() {
            warn!(path = %store.root().display(), error = %e, "Cannot create configuration directory");
        }
        let methods = discover(&config.discovery, runner.as_ref()).await;
        Self::with_methods(config, store, runner, clock, methods)
    }

    /// Build a resolver over an explicit method list.
    ///
    /// The manual fallback is appended if missing and moved to the end if present.
    #[must_use]
    pub fn with_methods(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        runner: Arc<dyn ProcessRunner>,
        clock: Arc<dyn Clock>,
        methods: Vec<AuthMethod>,
    ) -> Self {
        let mut methods: Vec<_> = methods
            .into_iter()
            .filter(|m| m.kind != MethodKind::ManualFallback)
            .collect();
        methods.push(AuthMethod::manual());

        let ctx = ProbeContext {
            store: Arc::clone(&store),
            runner: Arc::clone(&runner),
            clock: Arc::clone(&clock),
            image: config.image.clone(),
            timings: config.timings,
            allow_unverified: config.allow_unverified,
        };
        let probes = methods.iter().map(|m| build_probe(m, &ctx)).collect();

        Self {
            config,
            store,
            runner,
            clock,
            methods,
            probes,
            lock: Mutex::new(()),
        }
    }

    /// The discovered methods, in priority order.
    #[must_use]
    pub fn methods(&self) -> &[AuthMethod] {
        &self.methods
    }

    /// Names of the discovered methods, in priority order.
    #[must_use]
    pub fn available_methods(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.kind.as_str().to_string()).collect()
    }

    /// Get a reference to the resolver config.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Authenticate with `code`, trying each method in order until one succeeds.
    ///
    /// Existing credential files are cleared first. Concurrent calls are
    /// serialized: a second caller waits for the first to finish.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmptyCredential` for a blank code (without touching
    /// the filesystem), `AuthError::AllMethodsExhausted` if no method succeeds,
    /// or `AuthError::Store` if the configuration directory cannot be cleared.
    pub async fn authenticate(&self, code: &str) -> Result<AuthOutcome> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCredential);
        }

        let _guard = self.lock.lock().await;
        info!(code_length = code.chars().count(), "Starting authentication");

        let removed = self.store.clear_credentials()?;
        if !removed.is_empty() {
            info!(files = ?removed, "Cleared previous credential files");
        }
        tokio::time::sleep(self.config.clear_settle).await;

        let mut attempted = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            let kind = probe.method().kind;
            attempted.push(kind.as_str().to_string());
            info!(method = %kind, locator = %probe.method().locator, "Trying authentication method");

            match probe.attempt(code).await {
                Ok(success) => {
                    let files = self.store.credential_files().unwrap_or_else(|e| {
                        warn!(error = %e, "Cannot list credential files after authentication");
                        Vec::new()
                    });
                    let record = CredentialRecord::success(
                        code,
                        success.method.clone(),
                        self.clock.unix_seconds(),
                        files.clone(),
                    );
                    if let Err(e) = self.store.write_record(&record) {
                        warn!(error = %e, "Failed to write authentication record");
                    }
                    info!(method = %success.method, files = files.len(), "Authentication succeeded");
                    return Ok(AuthOutcome {
                        method: success.method,
                        message: success.message,
                        files,
                    });
                }
                Err(e) => info!(method = %kind, error = %e, "Authentication method failed"),
            }
        }

        warn!(attempted = ?attempted, "All authentication methods failed");
        Err(AuthError::AllMethodsExhausted { attempted })
    }

    /// Run the layered authentication check.
    ///
    /// Returns the first piece of evidence found, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration directory cannot be read, or if an
    /// enabled runtime check could not run and no other evidence was found.
    pub async fn check_authenticated(&self) -> Result<Option<Evidence>> {
        if let Some(file) = self.store.well_known_credential()? {
            return Ok(Some(Evidence::CredentialFile { name: file.name }));
        }

        if let Some(file) = self
            .store
            .credential_files()?
            .into_iter()
            .find(CredentialFile::is_non_empty)
        {
            return Ok(Some(Evidence::OtherFile { name: file.name }));
        }

        match self.store.read_record() {
            Ok(Some(record)) => {
                let now = self.clock.unix_seconds();
                if record.is_fresh(now, self.config.freshness_window_secs) {
                    return Ok(Some(Evidence::FreshRecord {
                        age_secs: now - record.timestamp,
                        method: record.method,
                    }));
                }
                debug!(age_secs = now - record.timestamp, "Authentication record is stale");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Unreadable authentication record"),
        }

        if self.runtime_checks_enabled() {
            return self.check_runtime().await;
        }
        Ok(None)
    }

    /// Returns true if any authentication evidence exists. Errors count as `false`.
    pub async fn is_authenticated(&self) -> bool {
        match self.check_authenticated().await {
            Ok(Some(evidence)) => {
                debug!(evidence = ?evidence, "Authenticated");
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Authentication check failed");
                false
            }
        }
    }

    /// Remove every credential file, keeping the metadata record.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be removed.
    pub fn clear_auth(&self) -> Result<Vec<String>> {
        let removed = self.store.clear_credentials()?;
        info!(files = ?removed, "Cleared authentication");
        Ok(removed)
    }

    /// Report the authentication state. Read failures degrade to empty values.
    pub async fn auth_status(&self) -> AuthStatus {
        let files = self.store.list_files().unwrap_or_else(|e| {
            warn!(error = %e, "Cannot list configuration directory");
            Vec::new()
        });
        let last_info = self.store.read_record().ok().flatten();

        AuthStatus {
            authenticated: self.is_authenticated().await,
            config_path: self.store.root().display().to_string(),
            files,
            last_info,
            available_methods: self.available_methods(),
        }
    }

    fn runtime_checks_enabled(&self) -> bool {
        self.config.runtime_checks
            && self
                .methods
                .iter()
                .any(|m| m.kind == MethodKind::RuntimeFallback)
    }

    fn runtime_cli(&self) -> &str {
        self.methods
            .iter()
            .find(|m| m.kind == MethodKind::RuntimeFallback)
            .map_or(self.config.discovery.runtime_cli.as_str(), |m| m.locator.as_str())
    }

    async fn check_runtime(&self) -> Result<Option<Evidence>> {
        let cli = self.runtime_cli();
        let mut failure: Option<ProcessError> = None;

        let ps = CommandSpec::new(
            cli,
            [
                "ps".to_string(),
                "--filter".to_string(),
                format!("name={}", self.config.container_name),
                "--format".to_string(),
                "{{.Status}}".to_string(),
            ],
        )
        .timeout(self.config.status_timeout);
        match self.runner.run(&ps).await {
            Ok(output) if output.success() && output.stdout.contains("Up") => {
                return Ok(Some(Evidence::ContainerRunning));
            }
            Ok(_) => {}
            Err(e) => failure = Some(e),
        }

        let status = CommandSpec::new(
            cli,
            [
                "run".to_string(),
                "--rm".to_string(),
                "-v".to_string(),
                format!(
                    "{}:{}",
                    self.store.root().display(),
                    provider_console_store::schema::CLIENT_CONFIG_MOUNT
                ),
                self.config.image.clone(),
                "status".to_string(),
            ],
        )
        .timeout(self.config.sandbox_status_timeout);
        match self.runner.run(&status).await {
            Ok(output) if output.success() && output.contains_any(&STATUS_PHRASES) => {
                return Ok(Some(Evidence::SandboxStatus));
            }
            Ok(_) => {}
            Err(e) => failure = failure.or(Some(e)),
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }
}
