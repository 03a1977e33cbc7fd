use std::collections::BTreeMap;

use serde::Serialize;

use crate::matcher::PLACEHOLDER;
use crate::services::{InterwikiRow, LanguageNames, bcp47};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterwikiEntry {
    pub prefix: String,
    pub url: String,
    pub protocol_relative: bool,
    pub local: bool,
    pub language: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcp47: Option<String>,
    pub local_interwiki: bool,
    pub extra_language_link: bool,
}

/// Site values the interwiki map is enriched with.
#[derive(Debug, Clone, Copy)]
pub struct InterwikiSite<'a> {
    pub server_origin: &'a str,
    pub default_protocol: &'a str,
    pub local_interwikis: &'a [String],
    pub extra_language_prefixes: &'a [String],
}

/// One entry per prefix; a prefix repeated in the table keeps its last row.
pub fn build_interwiki_map(
    rows: &[InterwikiRow],
    names: &dyn LanguageNames,
    site: &InterwikiSite<'_>,
) -> BTreeMap<String, InterwikiEntry> {
    let mut map = BTreeMap::new();
    for row in rows {
        let language = names.is_known_language(&row.prefix);
        let entry = InterwikiEntry {
            prefix: row.prefix.clone(),
            url: expand_interwiki_url(&row.url, site),
            protocol_relative: row.url.starts_with("//"),
            local: row.local,
            language,
            bcp47: language.then(|| bcp47(&row.prefix)),
            local_interwiki: site.local_interwikis.contains(&row.prefix),
            extra_language_link: site.extra_language_prefixes.contains(&row.prefix),
        };
        map.insert(row.prefix.clone(), entry);
    }
    map
}

fn expand_interwiki_url(url: &str, site: &InterwikiSite<'_>) -> String {
    let mut expanded = if url.starts_with("//") {
        format!("{}:{url}", site.default_protocol)
    } else if url.starts_with('/') {
        format!("{}{url}", site.server_origin)
    } else {
        url.to_string()
    };
    // Every URL needs a title slot.
    if !expanded.contains(PLACEHOLDER) {
        expanded.push_str(PLACEHOLDER);
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    struct KnownLanguages(&'static [&'static str]);

    impl LanguageNames for KnownLanguages {
        fn is_known_language(&self, code: &str) -> bool {
            self.0.contains(&code)
        }
    }

    fn row(prefix: &str, url: &str, local: bool) -> InterwikiRow {
        InterwikiRow {
            prefix: prefix.to_string(),
            url: url.to_string(),
            local,
        }
    }

    #[test]
    fn entries_carry_site_flags() {
        let rows = vec![
            row("de", "//de.wikipedia.org/wiki/$1", true),
            row("commons", "https://commons.wikimedia.org/wiki/$1", true),
            row("mw", "https://www.mediawiki.org/wiki/$1", false),
            row("zh-min-nan", "https://zh-min-nan.wikipedia.org/wiki/$1", false),
        ];
        let local = vec!["mw".to_string()];
        let extra = vec!["mw".to_string(), "commons".to_string()];
        let site = InterwikiSite {
            server_origin: "https://en.wikipedia.org",
            default_protocol: "https",
            local_interwikis: &local,
            extra_language_prefixes: &extra,
        };
        let map = build_interwiki_map(&rows, &KnownLanguages(&["de", "zh-min-nan"]), &site);

        assert_eq!(map.len(), 4);
        let de = &map["de"];
        assert!(de.protocol_relative);
        assert_eq!(de.url, "https://de.wikipedia.org/wiki/$1");
        assert!(de.local);
        assert!(de.language);
        assert_eq!(de.bcp47.as_deref(), Some("de"));
        assert!(!de.local_interwiki);
        assert!(!de.extra_language_link);

        let commons = &map["commons"];
        assert!(!commons.protocol_relative);
        assert!(!commons.language);
        assert_eq!(commons.bcp47, None);
        assert!(commons.extra_language_link);

        let mw = &map["mw"];
        assert!(!mw.local);
        assert!(mw.local_interwiki);
        assert!(mw.extra_language_link);

        assert_eq!(map["zh-min-nan"].bcp47.as_deref(), Some("nan"));
    }

    #[test]
    fn urls_without_placeholder_get_one_appended() {
        let rows = vec![
            row("self", "/wiki/", true),
            row("search", "https://search.example/?q=", false),
        ];
        let site = InterwikiSite {
            server_origin: "https://wiki.example",
            default_protocol: "https",
            local_interwikis: &[],
            extra_language_prefixes: &[],
        };
        let map = build_interwiki_map(&rows, &KnownLanguages(&[]), &site);
        assert_eq!(map["self"].url, "https://wiki.example/wiki/$1");
        assert_eq!(map["search"].url, "https://search.example/?q=$1");
    }

    #[test]
    fn repeated_prefix_keeps_last_row() {
        let rows = vec![
            row("wp", "https://old.example/$1", false),
            row("wp", "https://new.example/$1", true),
        ];
        let site = InterwikiSite {
            server_origin: "https://wiki.example",
            default_protocol: "https",
            local_interwikis: &[],
            extra_language_prefixes: &[],
        };
        let map = build_interwiki_map(&rows, &KnownLanguages(&[]), &site);
        assert_eq!(map.len(), 1);
        assert_eq!(map["wp"].url, "https://new.example/$1");
        assert!(map["wp"].local);
    }
}
