//! Filesystem-safe directory names for provider ids.

/// Sanitizes a provider display name into a directory name.
///
/// - Runs of whitespace become a single `-`
/// - Anything outside `[A-Za-z0-9_-]` is dropped
/// - Leading/trailing `-` and `_` are trimmed
/// - Limits length to 255 bytes (Linux NAME_MAX)
/// - An empty result becomes `provider`
pub fn sanitize_provider_dir(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_space = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push('-');
            }
            prev_space = true;
            continue;
        }
        prev_space = false;
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        }
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '_');
    let mut s = trimmed.to_string();
    s.truncate(NAME_MAX);
    if s.is_empty() {
        s.push_str("provider");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_becomes_dash() {
        assert_eq!(sanitize_provider_dir("OpenStreetMap  Standard"), "OpenStreetMap-Standard");
    }

    #[test]
    fn drops_path_separators_and_punctuation() {
        assert_eq!(sanitize_provider_dir("../Esri/World (Imagery)"), "EsriWorld-Imagery");
    }

    #[test]
    fn keeps_dash_and_underscore() {
        assert_eq!(sanitize_provider_dir("carto_light-v2"), "carto_light-v2");
    }

    #[test]
    fn empty_falls_back() {
        assert_eq!(sanitize_provider_dir("   "), "provider");
        assert_eq!(sanitize_provider_dir("..."), "provider");
    }
}
