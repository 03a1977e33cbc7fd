//! In-memory upstream tables, deserialized from the `services` section of a
//! site file. Answers every capability trait in [`crate::services`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::services::{
    InterwikiLookup, InterwikiRow, LanguageConverters, LanguageNames, LanguageRules, MagicWords,
    NS_MAIN, NamespaceInfo, SpecialPages, SynonymSet, UserOptions, VariantConverter,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticServices {
    pub language: StaticLanguage,
    pub namespaces: Vec<StaticNamespace>,
    pub magic_words: Vec<SynonymSet>,
    /// Ids of the behavior-switch magic words.
    pub double_underscore: Vec<String>,
    pub special_pages: Vec<StaticSpecialPage>,
    pub interwiki: Vec<InterwikiRow>,
    /// Language code -> autonym.
    pub language_names: BTreeMap<String, String>,
    pub user_options: BTreeMap<String, String>,
    pub conversion_disabled: bool,
    pub converters: Vec<VariantConverter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticLanguage {
    pub code: String,
    pub rtl: bool,
    pub link_trail: String,
    pub link_prefix_charset: String,
    pub link_prefix_extension: bool,
    pub namespace_aliases: Vec<NamespaceAlias>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NamespaceAlias {
    pub name: String,
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticNamespace {
    pub id: i32,
    pub canonical: String,
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub subpages: bool,
    #[serde(default = "default_capitalized")]
    pub capitalized: bool,
}

fn default_capitalized() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StaticSpecialPage {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl StaticServices {
    fn namespace(&self, ns: i32) -> Option<&StaticNamespace> {
        self.namespaces.iter().find(|entry| entry.id == ns)
    }

    /// Every table row for `id`; a word may be split into several rows.
    fn words<'a>(&'a self, id: &'a str) -> impl Iterator<Item = SynonymSet> + 'a {
        self.magic_words
            .iter()
            .filter(move |word| word.id == id)
            .cloned()
    }

    fn special_page(&self, canonical: &str) -> Option<&StaticSpecialPage> {
        self.special_pages
            .iter()
            .find(|page| page.canonical == canonical)
    }
}

fn lookup_key(name: &str) -> String {
    name.trim().replace(' ', "_").to_lowercase()
}

impl LanguageRules for StaticServices {
    fn namespace_index(&self, name: &str) -> Option<i32> {
        let key = lookup_key(name);
        self.namespaces
            .iter()
            .find(|entry| {
                entry.local.as_deref().is_some_and(|local| lookup_key(local) == key)
                    || lookup_key(&entry.canonical) == key
            })
            .map(|entry| entry.id)
            .or_else(|| {
                self.language
                    .namespace_aliases
                    .iter()
                    .find(|alias| lookup_key(&alias.name) == key)
                    .map(|alias| alias.id)
            })
    }

    fn namespace_text(&self, ns: i32) -> Option<String> {
        match self.namespace(ns) {
            Some(entry) => Some(
                entry
                    .local
                    .clone()
                    .unwrap_or_else(|| entry.canonical.clone())
                    .replace(' ', "_"),
            ),
            None if ns == NS_MAIN => Some(String::new()),
            None => None,
        }
    }

    fn namespace_aliases(&self) -> Vec<(String, i32)> {
        self.language
            .namespace_aliases
            .iter()
            .map(|alias| (alias.name.clone(), alias.id))
            .collect()
    }

    fn special_page_aliases(&self, canonical: &str) -> Option<Vec<String>> {
        self.special_page(canonical)
            .filter(|page| !page.aliases.is_empty())
            .map(|page| page.aliases.clone())
    }

    fn ucfirst(&self, text: &str) -> String {
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    }

    fn is_rtl(&self) -> bool {
        self.language.rtl
    }

    fn link_trail(&self) -> String {
        self.language.link_trail.clone()
    }

    fn link_prefix_charset(&self) -> String {
        self.language.link_prefix_charset.clone()
    }

    fn link_prefix_extension(&self) -> bool {
        self.language.link_prefix_extension
    }
}

impl NamespaceInfo for StaticServices {
    fn canonical_index(&self, name: &str) -> Option<i32> {
        let key = lookup_key(name);
        self.namespaces
            .iter()
            .find(|entry| lookup_key(&entry.canonical) == key)
            .map(|entry| entry.id)
    }

    fn canonical_name(&self, ns: i32) -> Option<String> {
        match self.namespace(ns) {
            Some(entry) => Some(entry.canonical.replace(' ', "_")),
            None if ns == NS_MAIN => Some(String::new()),
            None => None,
        }
    }

    fn has_subpages(&self, ns: i32) -> bool {
        self.namespace(ns).is_some_and(|entry| entry.subpages)
    }

    fn is_capitalized(&self, ns: i32) -> bool {
        self.namespace(ns).is_none_or(|entry| entry.capitalized)
    }

    fn is_talk(&self, ns: i32) -> bool {
        ns > NS_MAIN && ns % 2 == 1
    }
}

impl MagicWords for StaticServices {
    fn synonym_array(&self, ids: &[&str]) -> Vec<SynonymSet> {
        ids.iter().flat_map(|id| self.words(*id)).collect()
    }

    fn double_underscore_array(&self) -> Vec<SynonymSet> {
        self.double_underscore
            .iter()
            .flat_map(|id| self.words(id))
            .collect()
    }

    fn ids(&self) -> Vec<String> {
        self.magic_words.iter().map(|word| word.id.clone()).collect()
    }
}

impl SpecialPages for StaticServices {
    fn resolve_alias(&self, alias: &str) -> Option<(String, Option<String>)> {
        let (name, subpage) = match alias.split_once('/') {
            Some((name, subpage)) => (name, Some(subpage.to_string())),
            None => (alias, None),
        };
        let key = lookup_key(name);
        self.special_pages
            .iter()
            .find(|page| {
                lookup_key(&page.canonical) == key
                    || page.aliases.iter().any(|item| lookup_key(item) == key)
            })
            .map(|page| (page.canonical.clone(), subpage))
    }

    fn local_name_for(&self, canonical: &str, subpage: Option<&str>) -> String {
        let local = self
            .special_page(canonical)
            .and_then(|page| page.aliases.first())
            .map(String::as_str)
            .unwrap_or(canonical);
        match subpage {
            Some(subpage) => format!("{local}/{subpage}"),
            None => local.to_string(),
        }
    }
}

impl InterwikiLookup for StaticServices {
    fn all_prefixes(&self) -> Vec<InterwikiRow> {
        self.interwiki.clone()
    }
}

impl LanguageNames for StaticServices {
    fn is_known_language(&self, code: &str) -> bool {
        self.language_names.contains_key(code)
    }
}

impl UserOptions for StaticServices {
    fn default_option(&self, name: &str) -> Option<String> {
        self.user_options.get(name).cloned()
    }
}

impl LanguageConverters for StaticServices {
    fn is_conversion_disabled(&self) -> bool {
        self.conversion_disabled
    }

    fn languages_with_variants(&self) -> Vec<String> {
        self.converters
            .iter()
            .map(|converter| converter.code.clone())
            .collect()
    }

    fn converter(&self, code: &str) -> Option<VariantConverter> {
        self.converters
            .iter()
            .find(|converter| converter.code == code)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{NS_CATEGORY, NS_SPECIAL};

    fn services() -> StaticServices {
        StaticServices {
            language: StaticLanguage {
                code: "de".to_string(),
                namespace_aliases: vec![NamespaceAlias {
                    name: "Kat".to_string(),
                    id: NS_CATEGORY,
                }],
                ..StaticLanguage::default()
            },
            namespaces: vec![
                StaticNamespace {
                    id: NS_SPECIAL,
                    canonical: "Special".to_string(),
                    local: Some("Spezial".to_string()),
                    subpages: false,
                    capitalized: true,
                },
                StaticNamespace {
                    id: 3,
                    canonical: "User talk".to_string(),
                    local: Some("Benutzer Diskussion".to_string()),
                    subpages: true,
                    capitalized: true,
                },
                StaticNamespace {
                    id: NS_CATEGORY,
                    canonical: "Category".to_string(),
                    local: Some("Kategorie".to_string()),
                    subpages: false,
                    capitalized: false,
                },
            ],
            special_pages: vec![StaticSpecialPage {
                canonical: "Recentchanges".to_string(),
                aliases: vec!["Letzte_Änderungen".to_string()],
            }],
            ..StaticServices::default()
        }
    }

    #[test]
    fn namespace_lookups_accept_local_canonical_and_alias_names() {
        let services = services();
        assert_eq!(services.namespace_index("kategorie"), Some(NS_CATEGORY));
        assert_eq!(services.namespace_index("Category"), Some(NS_CATEGORY));
        assert_eq!(services.namespace_index("KAT"), Some(NS_CATEGORY));
        assert_eq!(services.namespace_index("Benutzer Diskussion"), Some(3));
        assert_eq!(services.namespace_index("Nope"), None);
        assert_eq!(services.canonical_index("user_talk"), Some(3));
        assert_eq!(services.canonical_index("Kategorie"), None);
        assert_eq!(
            services.namespace_text(3).as_deref(),
            Some("Benutzer_Diskussion")
        );
        assert_eq!(services.canonical_name(NS_MAIN).as_deref(), Some(""));
        assert_eq!(services.canonical_name(42), None);
    }

    #[test]
    fn namespace_flags() {
        let services = services();
        assert!(services.has_subpages(3));
        assert!(!services.has_subpages(NS_CATEGORY));
        assert!(!services.is_capitalized(NS_CATEGORY));
        assert!(services.is_capitalized(42));
        assert!(services.is_talk(3));
        assert!(!services.is_talk(NS_SPECIAL));
        assert!(!services.is_talk(NS_CATEGORY));
    }

    #[test]
    fn special_page_alias_resolution() {
        let services = services();
        assert_eq!(
            services.resolve_alias("letzte Änderungen/50"),
            Some(("Recentchanges".to_string(), Some("50".to_string())))
        );
        assert_eq!(services.resolve_alias("Unknown"), None);
        assert_eq!(
            services.local_name_for("Recentchanges", Some("50")),
            "Letzte_Änderungen/50"
        );
        assert_eq!(services.local_name_for("Search", None), "Search");
    }

    #[test]
    fn ucfirst_handles_multibyte_letters() {
        let services = services();
        assert_eq!(services.ucfirst("ärger"), "Ärger");
        assert_eq!(services.ucfirst(""), "");
    }
}
