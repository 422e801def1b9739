use std::sync::LazyLock;

use regex::Regex;

const LABEL_PREFIX: &str = "AOI_";

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").unwrap());

/// Replaces spaces with underscores, then drops anything outside `[A-Za-z0-9_]`.
pub fn sanitize(text: &str) -> String {
    DISALLOWED
        .replace_all(&text.replace(' ', "_"), "")
        .into_owned()
}

pub fn validate_type(aoi_type: &str) -> String {
    sanitize(aoi_type)
}

/// Builds `AOI_<type>_<name>`. `aoi_type` is expected to be sanitized already.
///
/// A name that already carries the `AOI_` prefix loses exactly that prefix, so
/// `IOA_test` is left alone.
pub fn generate_label(name: &str, aoi_type: &str) -> String {
    let name = sanitize(name);
    let name = name.strip_prefix(LABEL_PREFIX).unwrap_or(&name);
    format!("{LABEL_PREFIX}{aoi_type}_{name}")
}
