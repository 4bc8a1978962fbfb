//! Artifact registry naming for application versions.

/// Registry reference of the archive for `(app_id, sequence)`.
///
/// `registry.host/base/lower(app_id):sequence`. Any `scheme://` prefix and
/// trailing slashes of `base_uri` are dropped; registry names only allow a
/// small lowercase charset, hence the lowercased app id.
pub fn artifact_reference(app_id: &str, sequence: i64, base_uri: &str) -> String {
    let base = base_uri
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_uri)
        .trim_end_matches('/');
    format!("{}/{}:{}", base, app_id.to_lowercase(), sequence)
}

/// Registry host of an artifact reference (`registry.host[:port]`).
pub fn registry_host(reference: &str) -> &str {
    reference.split('/').next().unwrap_or(reference)
}

/// Title of the archive layer, `appversion-<app_id>-<sequence>.tar.gz`.
pub fn archive_title(app_id: &str, sequence: i64) -> String {
    format!("appversion-{}-{}.tar.gz", app_id, sequence)
}
