// Destination prefix for uploads.

pub const DEFAULT_TEMPLATE: &str = "{user}";
const USER_PLACEHOLDER: &str = "{user}";

/// Builds the namespace from a template (flag or `SHBIN_NAMESPACE`, already
/// chosen by the caller), the caller identity and an optional target dir.
/// The result never ends with a slash and may be empty.
pub fn resolve(template: Option<&str>, identity: &str, target_dir: Option<&str>) -> String {
    let template = template.unwrap_or(DEFAULT_TEMPLATE);
    let mut namespace = template
        .replace(USER_PLACEHOLDER, identity)
        .trim_end_matches('/')
        .to_string();

    if let Some(dir) = target_dir.map(|d| d.trim_end_matches('/')) {
        if !dir.is_empty() {
            namespace = format!("{namespace}/{dir}");
        }
    }
    namespace
}

/// Joins a namespace and a file name with a single slash. An empty
/// namespace yields a root level path.
pub fn join(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
        .trim_start_matches('/')
        .to_string()
}
