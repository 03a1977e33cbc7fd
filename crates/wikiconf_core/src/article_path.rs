use serde::Serialize;
use url::Url;

use crate::error::ConfigError;
use crate::matcher::PLACEHOLDER;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticlePathShape {
    /// Absolute URI of the directory page URLs live in; always ends in `/`.
    pub base_uri: String,
    /// Prefix that turns a title into a link relative to `base_uri`.
    pub relative_link_prefix: String,
}

/// Validate an article path template and split it into base URI and relative prefix.
///
/// `server` may be protocol-relative; `default_protocol` (e.g. `https`) fills the scheme.
pub fn resolve_article_path(
    template: &str,
    server: &str,
    default_protocol: &str,
) -> Result<ArticlePathShape, ConfigError> {
    if template.matches(PLACEHOLDER).count() != 1 {
        return Err(malformed(template, "must contain the $1 placeholder exactly once"));
    }
    if template.contains('\\') {
        return Err(malformed(template, "must not contain a backslash"));
    }

    let (prefix, _) = template
        .split_once(PLACEHOLDER)
        .unwrap_or((template, ""));
    let server_url =
        parse_server(server, default_protocol).ok_or_else(|| ConfigError::InvalidSetting {
            name: "Server".to_string(),
            expected: "an absolute or protocol-relative URL",
        })?;

    // Relative templates are rooted at the server, never at its path.
    let reference = if is_absolute(prefix) || prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{prefix}")
    };
    let location = server_url
        .join(&reference)
        .map_err(|_| malformed(template, "does not resolve against the server URL"))?;

    let path = location.path();
    let (directory, tail) = match path.rfind('/') {
        Some(slash) => (&path[..=slash], &path[slash..]),
        None => ("/", "/"),
    };

    let mut base = location.clone();
    base.set_query(None);
    base.set_fragment(None);
    base.set_path(directory);

    let mut relative_link_prefix = format!(".{tail}");
    if let Some(query) = location.query() {
        relative_link_prefix.push('?');
        relative_link_prefix.push_str(query);
    }
    if let Some(fragment) = location.fragment() {
        relative_link_prefix.push('#');
        relative_link_prefix.push_str(fragment);
    }

    Ok(ArticlePathShape {
        base_uri: base.to_string(),
        relative_link_prefix,
    })
}

fn malformed(template: &str, reason: &'static str) -> ConfigError {
    ConfigError::MalformedArticlePath {
        path: template.to_string(),
        reason,
    }
}

fn is_absolute(reference: &str) -> bool {
    Url::parse(reference).is_ok_and(|url| url.has_host())
}

/// Parse a server setting, filling the scheme of a protocol-relative value.
pub fn parse_server(server: &str, default_protocol: &str) -> Option<Url> {
    let server = server.trim();
    let parsed = if server.starts_with("//") {
        Url::parse(&format!("{default_protocol}:{server}"))
    } else {
        Url::parse(server)
    };
    parsed.ok().filter(Url::has_host)
}

/// Scheme and authority of `server`, without a trailing slash.
pub fn expand_origin(server: &str, default_protocol: &str) -> String {
    let origin = parse_server(server, default_protocol).map(|url| url.origin());
    match origin {
        Some(origin) if origin.is_tuple() => origin.ascii_serialization(),
        _ => server.trim().trim_end_matches('/').to_string(),
    }
}

/// Scheme of an absolute URL (`https://x` -> `https`).
pub fn url_scheme(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .filter(Url::has_host)
        .map(|url| url.scheme().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(template: &str, server: &str) -> ArticlePathShape {
        resolve_article_path(template, server, "https").expect("resolve")
    }

    #[test]
    fn wiki_path_resolves_to_directory_base() {
        let shape = resolve("/wiki/$1", "https://localhost");
        assert_eq!(shape.base_uri, "https://localhost/wiki/");
        assert_eq!(shape.relative_link_prefix, "./");
    }

    #[test]
    fn bare_placeholder_resolves_to_server_root() {
        let shape = resolve("$1", "https://localhost");
        assert_eq!(shape.base_uri, "https://localhost/");
        assert_eq!(shape.relative_link_prefix, "./");
    }

    #[test]
    fn missing_placeholder_is_rejected() {
        let error = resolve_article_path("/test/test", "https://localhost", "https")
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::MalformedArticlePath { .. }));
    }

    #[test]
    fn repeated_placeholder_is_rejected() {
        let error = resolve_article_path("/$1/$1", "https://localhost", "https")
            .expect_err("must fail");
        assert!(error.to_string().contains("exactly once"));
    }

    #[test]
    fn backslash_is_rejected() {
        let error = resolve_article_path("test\\test/$1", "https://localhost", "https")
            .expect_err("must fail");
        assert_eq!(
            error,
            ConfigError::MalformedArticlePath {
                path: "test\\test/$1".to_string(),
                reason: "must not contain a backslash",
            }
        );
    }

    #[test]
    fn unusable_server_is_a_setting_error() {
        let error = resolve_article_path("/wiki/$1", "localhost", "https").expect_err("must fail");
        assert!(matches!(error, ConfigError::InvalidSetting { ref name, .. } if name == "Server"));
    }

    #[test]
    fn query_style_path_keeps_script_in_prefix() {
        let shape = resolve("/w/index.php?title=$1", "https://wiki.example");
        assert_eq!(shape.base_uri, "https://wiki.example/w/");
        assert_eq!(shape.relative_link_prefix, "./index.php?title=");
    }

    #[test]
    fn protocol_relative_server_gets_default_protocol() {
        let shape = resolve_article_path("/wiki/$1", "//wiki.example/", "http").expect("resolve");
        assert_eq!(shape.base_uri, "http://wiki.example/wiki/");
    }

    #[test]
    fn absolute_template_supplies_its_own_origin() {
        let shape = resolve("https://other.example/a/./b/../wiki/$1", "https://localhost");
        assert_eq!(shape.base_uri, "https://other.example/a/wiki/");
        assert_eq!(shape.relative_link_prefix, "./");
    }

    #[test]
    fn relative_template_is_rooted() {
        let shape = resolve("wiki/$1", "https://localhost/ignored/path");
        assert_eq!(shape.base_uri, "https://localhost/wiki/");
        assert_eq!(shape.relative_link_prefix, "./");
    }

    #[test]
    fn base_uri_is_a_normalized_absolute_url() {
        assert_eq!(
            resolve("/wiki/$1", "https://localhost?x=1").base_uri,
            "https://localhost/wiki/"
        );
        assert_eq!(
            resolve("/wiki/$1", "HTTPS://LocalHost:443").base_uri,
            "https://localhost/wiki/"
        );
        assert_eq!(
            resolve("/a b/$1", "https://localhost").base_uri,
            "https://localhost/a%20b/"
        );
        let shape = resolve("/wiki/$1", "http://localhost:8080");
        assert_eq!(shape.base_uri, "http://localhost:8080/wiki/");
        assert!(Url::parse(&shape.base_uri).is_ok());
    }

    #[test]
    fn origin_drops_default_port_and_path() {
        assert_eq!(expand_origin("//wiki.example/", "https"), "https://wiki.example");
        assert_eq!(expand_origin("HTTP://Wiki.Example:80/w", "https"), "http://wiki.example");
        assert_eq!(expand_origin("http://wiki.example:8080", "https"), "http://wiki.example:8080");
    }

    #[test]
    fn url_scheme_requires_a_host() {
        assert_eq!(url_scheme("HTTPS://example.org").as_deref(), Some("https"));
        assert_eq!(url_scheme("/wiki/$1"), None);
        assert_eq!(url_scheme("//example.org"), None);
        assert_eq!(url_scheme("mailto:someone@example.org"), None);
    }
}
