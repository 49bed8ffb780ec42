//! Filesystem-backed credential store for provider-console.
//!
//! Everything the console knows about authentication lives in one configuration
//! directory: opaque credential files produced by the provider client, plus a JSON
//! metadata record describing the last successful authentication.
//!
//! # Layout
//!
//! - `auth_info.json`: the [`CredentialRecord`] written on success
//! - `jwt`, `token`, `auth`, `credentials`: well-known credential files
//! - anything else: credential files written by other client builds
//!
//! # Example
//!
//! ```no_run
//! use provider_console_store::{CredentialStore, FsCredentialStore};
//!
//! let store = FsCredentialStore::open("/addon_config/.urnetwork").unwrap();
//!
//! for file in store.credential_files().unwrap() {
//!     println!("{} ({} bytes)", file.name, file.size);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fs;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use fs::FsCredentialStore;
pub use types::{CredentialFile, CredentialRecord, FRESHNESS_WINDOW_SECS};

use std::path::Path;

/// Operations over the configuration directory.
///
/// Every call re-reads the filesystem; nothing is cached.
pub trait CredentialStore: Send + Sync {
    /// The configuration directory this store manages.
    fn root(&self) -> &Path;

    /// Create the configuration directory (and parents) if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn ensure_root(&self) -> Result<()>;

    /// List every regular file in the directory, metadata included.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    fn list_files(&self) -> Result<Vec<CredentialFile>>;

    /// List credential files: regular files other than the metadata record.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    fn credential_files(&self) -> Result<Vec<CredentialFile>> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|file| !schema::is_metadata(&file.name))
            .collect())
    }

    /// Returns true if at least one non-empty credential file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    fn has_credentials(&self) -> Result<bool> {
        Ok(self
            .credential_files()?
            .iter()
            .any(CredentialFile::is_non_empty))
    }

    /// Returns the first well-known credential file that exists and is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be inspected.
    fn well_known_credential(&self) -> Result<Option<CredentialFile>>;

    /// Delete every credential file, keeping the metadata record.
    ///
    /// Returns the names that were removed. Calling this on an empty or missing
    /// directory succeeds and returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be removed.
    fn clear_credentials(&self) -> Result<Vec<String>>;

    /// Write a credential file with the given contents, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidName` if `name` is not a plain file name, or an
    /// I/O error if the write fails.
    fn write_credential(&self, name: &str, contents: &[u8]) -> Result<()>;

    /// Copy a file from elsewhere on disk into the directory under its base name.
    ///
    /// Returns the name it was stored under.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or the copy fails.
    fn import_credential(&self, source: &Path) -> Result<String>;

    /// Read the metadata record, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn read_record(&self) -> Result<Option<CredentialRecord>>;

    /// Replace the metadata record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    fn write_record(&self, record: &CredentialRecord) -> Result<()>;
}
