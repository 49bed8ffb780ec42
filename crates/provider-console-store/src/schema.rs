//! On-disk layout of the configuration directory.
//!
//! Everything lives in a single directory: one JSON metadata record plus zero or
//! more opaque credential files written by whichever authentication method won.

/// File names inside the configuration directory.
pub mod files {
    /// The metadata record written after a successful authentication.
    pub const METADATA: &str = "auth_info.json";

    /// Token file written by the provider client (and by manual authentication).
    pub const JWT: &str = "jwt";

    /// Secondary token marker.
    pub const TOKEN: &str = "token";

    /// Alternate credential file name used by some client builds.
    pub const AUTH: &str = "auth";

    /// Alternate credential file name used by some client builds.
    pub const CREDENTIALS: &str = "credentials";
}

/// Where the provider client expects the configuration directory inside its image.
pub const CLIENT_CONFIG_MOUNT: &str = "/root/.urnetwork";

/// Returns the well-known credential file names, in lookup order.
#[must_use]
pub fn well_known_credential_files() -> Vec<&'static str> {
    vec![files::JWT, files::TOKEN, files::AUTH, files::CREDENTIALS]
}

/// Returns true if `name` is the metadata record rather than a credential.
#[must_use]
pub fn is_metadata(name: &str) -> bool {
    name == files::METADATA
}
