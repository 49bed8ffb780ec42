//! Directory-backed storage implementation.
//!
//! This module provides the `FsCredentialStore` implementation of the
//! `CredentialStore` trait.

use std::ffi::OsStr;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::schema::{files, is_metadata, well_known_credential_files};
use crate::types::{CredentialFile, CredentialRecord};
use crate::CredentialStore;

/// Credential store rooted at a single configuration directory.
#[derive(Debug, Clone)]
pub struct FsCredentialStore {
    root: PathBuf,
}

impl FsCredentialStore {
    /// Open a store rooted at `path`, creating the directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::unchecked(path);
        store.ensure_root()?;
        Ok(store)
    }

    /// Create a store without touching the filesystem.
    #[must_use]
    pub fn unchecked<P: AsRef<Path>>(path: P) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
        }
    }

    fn metadata_path(&self) -> PathBuf {
        self.root.join(files::METADATA)
    }

    /// Resolve `name` inside the root, rejecting anything but a plain file name.
    fn child(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Size of a regular file, or `None` if it does not exist or is not a file.
    fn file_size(path: &Path) -> Result<Option<u64>> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl CredentialStore for FsCredentialStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| StoreError::io(&self.root, e))
    }

    fn list_files(&self) -> Result<Vec<CredentialFile>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            // Follows symlinks, so a link to a regular file counts as one.
            if let Some(size) = Self::file_size(&path)? {
                result.push(CredentialFile::new(
                    entry.file_name().to_string_lossy().into_owned(),
                    size,
                ));
            }
        }

        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn well_known_credential(&self) -> Result<Option<CredentialFile>> {
        for name in well_known_credential_files() {
            if let Some(size) = Self::file_size(&self.root.join(name))? {
                if size > 0 {
                    return Ok(Some(CredentialFile::new(name, size)));
                }
            }
        }
        Ok(None)
    }

    fn clear_credentials(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let file_name = entry.file_name();
            if file_name == OsStr::new(files::METADATA) {
                continue;
            }
            // Lossy names cannot be joined back onto the root.
            let path = entry.path();
            if Self::file_size(&path)?.is_none() {
                continue;
            }
            let name = file_name.to_string_lossy().into_owned();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(file = %name, "Removed credential file");
                    removed.push(name);
                }
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        removed.sort();
        Ok(removed)
    }

    fn write_credential(&self, name: &str, contents: &[u8]) -> Result<()> {
        let path = self.child(name)?;
        if is_metadata(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        self.ensure_root()?;
        std::fs::write(&path, contents).map_err(|e| StoreError::io(path, e))
    }

    fn import_credential(&self, source: &Path) -> Result<String> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidName(source.display().to_string()))?;
        let target = self.child(&name)?;
        if target == source {
            return Ok(name);
        }

        self.ensure_root()?;
        std::fs::copy(source, &target).map_err(|e| StoreError::io(source, e))?;
        tracing::debug!(source = %source.display(), file = %name, "Imported credential file");
        Ok(name)
    }

    fn read_record(&self) -> Result<Option<CredentialRecord>> {
        let path = self.metadata_path();
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn write_record(&self, record: &CredentialRecord) -> Result<()> {
        let data = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.ensure_root()?;
        let path = self.metadata_path();
        std::fs::write(&path, data).map_err(|e| StoreError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FsCredentialStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FsCredentialStore::open(dir.path().join(".urnetwork")).unwrap();
        (store, dir)
    }

    #[test]
    fn open_creates_directory() {
        let (store, _dir) = create_test_store();
        assert!(store.root().is_dir());
        assert!(store.list_files().unwrap().is_empty());
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FsCredentialStore::unchecked(dir.path().join("absent"));

        assert!(store.list_files().unwrap().is_empty());
        assert!(!store.has_credentials().unwrap());
        assert!(store.clear_credentials().unwrap().is_empty());
        assert!(store.read_record().unwrap().is_none());
    }

    #[test]
    fn credential_files_exclude_metadata() {
        let (store, _dir) = create_test_store();
        store.write_credential("jwt", b"token").unwrap();
        store
            .write_record(&CredentialRecord::success("code", "manual_fallback", 1.0, vec![]))
            .unwrap();

        let all: Vec<_> = store.list_files().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(all, vec!["auth_info.json", "jwt"]);

        let creds = store.credential_files().unwrap();
        assert_eq!(creds, vec![CredentialFile::new("jwt", 5)]);
    }

    #[test]
    fn empty_files_are_not_evidence() {
        let (store, _dir) = create_test_store();
        store.write_credential("jwt", b"").unwrap();

        assert!(!store.has_credentials().unwrap());
        assert!(store.well_known_credential().unwrap().is_none());

        store.write_credential("session", b"x").unwrap();
        assert!(store.has_credentials().unwrap());
        assert!(store.well_known_credential().unwrap().is_none());
    }

    #[test]
    fn well_known_lookup_follows_order() {
        let (store, _dir) = create_test_store();
        store.write_credential("credentials", b"abc").unwrap();
        store.write_credential("token", b"abcd").unwrap();

        let found = store.well_known_credential().unwrap().unwrap();
        assert_eq!(found.name, "token");
        assert_eq!(found.size, 4);
    }

    #[test]
    fn clear_keeps_metadata_and_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.write_credential("jwt", b"a").unwrap();
        store.write_credential("token", b"b").unwrap();
        store
            .write_record(&CredentialRecord::success("code", "direct_binary", 1.0, vec![]))
            .unwrap();

        let mut removed = store.clear_credentials().unwrap();
        removed.sort();
        assert_eq!(removed, vec!["jwt", "token"]);
        assert!(store.credential_files().unwrap().is_empty());
        assert!(store.read_record().unwrap().is_some());

        assert!(store.clear_credentials().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn clear_removes_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let (store, _dir) = create_test_store();
        let odd = store.root().join(OsStr::from_bytes(b"jwt-\xff"));
        std::fs::write(&odd, b"token").unwrap();
        store.write_credential("token", b"b").unwrap();

        let removed = store.clear_credentials().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!odd.exists());
        assert!(store.credential_files().unwrap().is_empty());
    }

    #[test]
    fn subdirectories_are_ignored() {
        let (store, _dir) = create_test_store();
        std::fs::create_dir(store.root().join("cache")).unwrap();
        store.write_credential("jwt", b"a").unwrap();

        let names: Vec<_> = store.list_files().unwrap().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["jwt"]);
        assert_eq!(store.clear_credentials().unwrap(), vec!["jwt"]);
        assert!(store.root().join("cache").is_dir());
    }

    #[test]
    fn write_rejects_path_names() {
        let (store, _dir) = create_test_store();

        for bad in ["", "../jwt", "a/b", "..", "auth_info.json"] {
            let err = store.write_credential(bad, b"x").unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{bad}");
        }
    }

    #[test]
    fn record_round_trip() {
        let (store, _dir) = create_test_store();
        store.write_credential("jwt", b"abc").unwrap();

        let files = store.credential_files().unwrap();
        let record = CredentialRecord::success(
            "0123456789abcdefghijklmnop",
            "direct_binary",
            1_700_000_000.25,
            files,
        );
        store.write_record(&record).unwrap();

        let loaded = store.read_record().unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.files_created, vec![CredentialFile::new("jwt", 3)]);
    }

    #[test]
    fn corrupt_record_is_a_serialization_error() {
        let (store, _dir) = create_test_store();
        std::fs::write(store.root().join("auth_info.json"), b"{not json").unwrap();

        let err = store.read_record().unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn import_copies_under_base_name() {
        let (store, dir) = create_test_store();
        let elsewhere = dir.path().join("tmp");
        std::fs::create_dir(&elsewhere).unwrap();
        std::fs::write(elsewhere.join("jwt"), b"imported").unwrap();

        let name = store.import_credential(&elsewhere.join("jwt")).unwrap();
        assert_eq!(name, "jwt");
        assert_eq!(std::fs::read(store.root().join("jwt")).unwrap(), b"imported");

        // Importing a file already in place is a no-op.
        assert_eq!(store.import_credential(&store.root().join("jwt")).unwrap(), "jwt");
    }
}
