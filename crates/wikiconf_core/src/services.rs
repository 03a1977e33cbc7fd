//! Read-only capability traits over the upstream services the facade consumes.
//!
//! Each trait covers one concern. "Not found" is an ordinary `None`, never an
//! error: the facade treats an unresolved code, id or alias as contributing
//! nothing to the derived artifact.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const NS_SPECIAL: i32 = -1;
pub const NS_MAIN: i32 = 0;
pub const NS_FILE: i32 = 6;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_CATEGORY: i32 = 14;

/// Synonyms recognized for one magic word id, in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymSet {
    pub id: String,
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl SynonymSet {
    pub fn new(id: &str, case_sensitive: bool, synonyms: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            synonyms: synonyms.iter().map(|item| (*item).to_string()).collect(),
            case_sensitive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterwikiRow {
    pub prefix: String,
    pub url: String,
    #[serde(default)]
    pub local: bool,
}

/// Variant table of one language converter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantConverter {
    pub code: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,
}

impl VariantConverter {
    /// A converter with a single variant (the language itself) has nothing to convert.
    pub fn has_variants(&self) -> bool {
        self.variants.len() > 1
    }

    pub fn fallbacks_for(&self, variant: &str) -> Vec<String> {
        match self.fallbacks.get(variant) {
            Some(chain) => chain.clone(),
            None => vec![self.code.clone()],
        }
    }
}

/// Rules of the site content language.
pub trait LanguageRules: Send + Sync {
    /// Namespace index for a localized name or alias (case-insensitive).
    fn namespace_index(&self, name: &str) -> Option<i32>;
    /// Localized namespace text, underscores for spaces.
    fn namespace_text(&self, ns: i32) -> Option<String>;
    /// Language-provided namespace aliases in upstream order.
    fn namespace_aliases(&self) -> Vec<(String, i32)>;
    fn special_page_aliases(&self, canonical: &str) -> Option<Vec<String>>;
    fn ucfirst(&self, text: &str) -> String;
    fn is_rtl(&self) -> bool;
    /// Link trail pattern, e.g. `^([a-z]+)(.*)$`.
    fn link_trail(&self) -> String;
    fn link_prefix_charset(&self) -> String;
    fn link_prefix_extension(&self) -> bool;
}

pub trait NamespaceInfo: Send + Sync {
    fn canonical_index(&self, name: &str) -> Option<i32>;
    fn canonical_name(&self, ns: i32) -> Option<String>;
    fn has_subpages(&self, ns: i32) -> bool;
    fn is_capitalized(&self, ns: i32) -> bool;
    fn is_talk(&self, ns: i32) -> bool;
}

pub trait MagicWords: Send + Sync {
    /// Every table row of each id in `ids`, in request order; unknown ids are left out.
    fn synonym_array(&self, ids: &[&str]) -> Vec<SynonymSet>;
    /// Behavior switches (`__NOTOC__` and friends).
    fn double_underscore_array(&self) -> Vec<SynonymSet>;
    fn ids(&self) -> Vec<String>;
}

pub trait SpecialPages: Send + Sync {
    /// Canonical page name and optional subpage for a localized alias.
    fn resolve_alias(&self, alias: &str) -> Option<(String, Option<String>)>;
    fn local_name_for(&self, canonical: &str, subpage: Option<&str>) -> String;
}

pub trait InterwikiLookup: Send + Sync {
    fn all_prefixes(&self) -> Vec<InterwikiRow>;
}

pub trait LanguageNames: Send + Sync {
    fn is_known_language(&self, code: &str) -> bool;
}

pub trait UserOptions: Send + Sync {
    fn default_option(&self, name: &str) -> Option<String>;
}

pub trait LanguageConverters: Send + Sync {
    fn is_conversion_disabled(&self) -> bool;
    /// Base languages that ship a converter, in upstream enumeration order.
    fn languages_with_variants(&self) -> Vec<String>;
    fn converter(&self, code: &str) -> Option<VariantConverter>;
}

/// Everything the facade reads from outside its own settings.
#[derive(Clone)]
pub struct SiteServices {
    pub language: Arc<dyn LanguageRules>,
    pub namespaces: Arc<dyn NamespaceInfo>,
    pub magic_words: Arc<dyn MagicWords>,
    pub special_pages: Arc<dyn SpecialPages>,
    pub interwiki: Arc<dyn InterwikiLookup>,
    pub language_names: Arc<dyn LanguageNames>,
    pub user_options: Arc<dyn UserOptions>,
    pub converters: Arc<dyn LanguageConverters>,
}

impl SiteServices {
    /// Bundle a single provider that answers for every concern.
    pub fn from_provider<T>(provider: Arc<T>) -> Self
    where
        T: LanguageRules
            + NamespaceInfo
            + MagicWords
            + SpecialPages
            + InterwikiLookup
            + LanguageNames
            + UserOptions
            + LanguageConverters
            + 'static,
    {
        Self {
            language: provider.clone(),
            namespaces: provider.clone(),
            magic_words: provider.clone(),
            special_pages: provider.clone(),
            interwiki: provider.clone(),
            language_names: provider.clone(),
            user_options: provider.clone(),
            converters: provider,
        }
    }
}

/// BCP 47 form of an internal language code.
pub fn bcp47(code: &str) -> String {
    let lowered = code.to_ascii_lowercase();
    let mapped = match lowered.as_str() {
        "simple" => "en-simple",
        "zh-classical" => "lzh",
        "zh-min-nan" => "nan",
        "zh-yue" => "yue",
        "be-x-old" => "be-tarask",
        "roa-rup" => "rup",
        "map-bms" => "jv-x-bms",
        "bat-smg" => "sgs",
        "fiu-vro" => "vro",
        "no" => "nb",
        other => other,
    };

    let segments: Vec<&str> = mapped.split('-').collect();
    let mut output = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let after_singleton = index > 0 && segments[index - 1].len() == 1;
        if index == 0 || after_singleton {
            output.push(segment.to_string());
        } else if segment.len() == 2 {
            output.push(segment.to_ascii_uppercase());
        } else if segment.len() == 4 {
            let mut chars = segment.chars();
            let titled = match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            };
            output.push(titled);
        } else {
            output.push(segment.to_string());
        }
    }
    output.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcp47_formats_region_and_script_subtags() {
        assert_eq!(bcp47("en"), "en");
        assert_eq!(bcp47("en-gb"), "en-GB");
        assert_eq!(bcp47("sr-latn"), "sr-Latn");
        assert_eq!(bcp47("zh-hans-cn"), "zh-Hans-CN");
        assert_eq!(bcp47("simple"), "en-simple");
        assert_eq!(bcp47("be-x-old"), "be-tarask");
        assert_eq!(bcp47("de-x-formal"), "de-x-formal");
    }

    #[test]
    fn converter_defaults_fallbacks_to_its_own_code() {
        let converter = VariantConverter {
            code: "sr".to_string(),
            variants: vec!["sr".to_string(), "sr-ec".to_string(), "sr-el".to_string()],
            fallbacks: BTreeMap::from([("sr-el".to_string(), vec!["sr-ec".to_string()])]),
        };
        assert!(converter.has_variants());
        assert_eq!(converter.fallbacks_for("sr-el"), vec!["sr-ec".to_string()]);
        assert_eq!(converter.fallbacks_for("sr-ec"), vec!["sr".to_string()]);

        let single = VariantConverter {
            code: "en".to_string(),
            variants: vec!["en".to_string()],
            fallbacks: BTreeMap::new(),
        };
        assert!(!single.has_variants());
    }
}
