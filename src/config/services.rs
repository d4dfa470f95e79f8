//! Static service tables
//!
//! One authoritative definition of the registry addresses, container and
//! volume names, the submodule list and the published-image map.

/// Internal docker registry release images are pushed to
pub const REGISTRY: &str = "docker.montagu.dide.ic.ac.uk:5000";

/// Public docker hub organisation used by `publish`
pub const PUBLIC_ORG: &str = "vimc";

/// Name of the database container in a running deployment
pub const DB_CONTAINER: &str = "montagu_db_1";

/// Name of the Orderly container in a running deployment
pub const ORDERLY_CONTAINER: &str = "montagu_orderly_orderly_1";

/// Named volume holding the Orderly report store
pub const ORDERLY_VOLUME: &str = "orderly_volume";

/// Every platform submodule whose pinned commit becomes an image tag
pub const SUBMODULES: &[&str] = &[
    "db",
    "orderly",
    "shiny",
    "api",
    "reporting-api",
    "contrib-portal",
    "admin-portal",
    "report-portal",
    "proxy",
    "cert-tool",
];

/// Published image name -> submodule directory.
///
/// The submodule directory also maps onto the compose service name, so
/// this table is the single place tying the three namespaces together.
pub const CONTAINER_REPO_MAP: &[(&str, &str)] = &[
    ("montagu-api", "api"),
    ("montagu-reporting-api", "reporting-api"),
    ("montagu-db", "db"),
    ("montagu-contrib-portal", "contrib-portal"),
    ("montagu-admin-portal", "admin-portal"),
    ("montagu-report-portal", "report-portal"),
    ("montagu-reverse-proxy", "proxy"),
    ("montagu-orderly", "orderly"),
];

/// Fully-qualified image name in the internal registry
pub fn image_name(name: &str, version: &str) -> String {
    format!("{}/{}:{}", REGISTRY, name, version)
}
