use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::article_path::{ArticlePathShape, expand_origin, resolve_article_path, url_scheme};
use crate::config::{
    ConfigSource, DEFAULT_ARTICLE_PATH, DEFAULT_LANGUAGE_CODE, DEFAULT_LEGAL_TITLE_CHARS,
    DEFAULT_MAX_TEMPLATE_DEPTH, DEFAULT_SCRIPT, DEFAULT_SERVER, DEFAULT_URL_PROTOCOLS,
    SettingsExt, SiteSettings, coerce_integer,
};
use crate::error::ConfigError;
use crate::interwiki::{InterwikiEntry, InterwikiSite, build_interwiki_map};
use crate::matcher::{
    AliasGroup, CompiledMatcher, ParameterizedMatcher, case_bucketed, prefix_matcher,
    quoted_aliases, single_bucket, start_to_end,
};
use crate::services::{NS_CATEGORY, NS_SPECIAL, SiteServices, bcp47};
use crate::static_services::StaticServices;
use crate::variants::{VariantEntry, resolve_variants, variant_candidates};
use crate::width::{THUMB_LIMITS_SETTING, resolve_width};

pub const REDIRECT_MAGIC_WORD: &str = "redirect";
const LINK_TRAIL_REST: &str = "(.*)$";
const EMPTY_LINK_TRAIL: &str = "^()";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GalleryOptions {
    pub images_per_row: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub caption_length: bool,
    pub show_bytes: bool,
    pub show_dimensions: bool,
    pub mode: String,
}

impl Default for GalleryOptions {
    fn default() -> Self {
        Self {
            images_per_row: 0,
            image_width: 120,
            image_height: 120,
            caption_length: true,
            show_bytes: true,
            show_dimensions: true,
            mode: "traditional".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoFollowConfig {
    pub nofollow: bool,
    pub ns_exceptions: Vec<i32>,
    pub domain_exceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamespaceCase {
    FirstLetter,
    CaseSensitive,
}

impl NamespaceCase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstLetter => "first-letter",
            Self::CaseSensitive => "case-sensitive",
        }
    }
}

#[derive(Debug, Default)]
struct MagicWordIndex {
    aliases: BTreeMap<String, Vec<String>>,
    sensitive: HashMap<String, String>,
    insensitive: HashMap<String, String>,
}

/// Derived site configuration for the content pipeline.
///
/// Every artifact is computed from the settings and upstream services on first
/// access and then served from this instance; nothing is shared across instances.
pub struct SiteConfig {
    settings: Arc<dyn ConfigSource>,
    services: SiteServices,
    article_path: OnceLock<Result<ArticlePathShape, ConfigError>>,
    interwiki_map: OnceLock<BTreeMap<String, InterwikiEntry>>,
    variants: OnceLock<BTreeMap<String, VariantEntry>>,
    redirect: OnceLock<Result<CompiledMatcher, ConfigError>>,
    behavior_switches: OnceLock<Result<CompiledMatcher, ConfigError>>,
    category: OnceLock<Result<CompiledMatcher, ConfigError>>,
    protocols: OnceLock<Result<CompiledMatcher, ConfigError>>,
    magic_words: OnceLock<MagicWordIndex>,
}

fn cached<T>(
    cell: &OnceLock<Result<T, ConfigError>>,
    init: impl FnOnce() -> Result<T, ConfigError>,
) -> Result<&T, ConfigError> {
    cell.get_or_init(init).as_ref().map_err(Clone::clone)
}

impl SiteConfig {
    pub fn new(settings: Arc<dyn ConfigSource>, services: SiteServices) -> Self {
        Self {
            settings,
            services,
            article_path: OnceLock::new(),
            interwiki_map: OnceLock::new(),
            variants: OnceLock::new(),
            redirect: OnceLock::new(),
            behavior_switches: OnceLock::new(),
            category: OnceLock::new(),
            protocols: OnceLock::new(),
            magic_words: OnceLock::new(),
        }
    }

    pub fn from_static(settings: SiteSettings, services: StaticServices) -> Self {
        Self::new(
            Arc::new(settings),
            SiteServices::from_provider(Arc::new(services)),
        )
    }

    /// Deployment override first, then the merged settings.
    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings
            .get_override(name)
            .or_else(|| self.settings.get(name))
    }

    pub fn gallery_options(&self) -> Result<GalleryOptions, ConfigError> {
        let mut merged = match serde_json::to_value(GalleryOptions::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let layers = [
            self.settings.get("GalleryOptions"),
            self.settings.get_override("GalleryOptions"),
        ];
        for layer in layers.into_iter().flatten() {
            if let Value::Object(map) = layer {
                merged.extend(map.iter().map(|(key, value)| (key.clone(), value.clone())));
            }
        }
        serde_json::from_value(Value::Object(merged)).map_err(|_| ConfigError::InvalidSetting {
            name: "GalleryOptions".to_string(),
            expected: "a table of gallery options",
        })
    }

    pub fn allowed_external_image_prefixes(&self) -> Vec<String> {
        if self.settings.bool_or("AllowExternalImages", false) {
            return vec![String::new()];
        }
        self.settings.string_list("AllowExternalImagesFrom")
    }

    pub fn server(&self) -> String {
        self.settings.string_or("Server", DEFAULT_SERVER)
    }

    /// Scheme used to expand protocol-relative URLs.
    pub fn default_protocol(&self) -> String {
        let server = self.server();
        let canonical = self.settings.optional_string("CanonicalServer");
        url_scheme(&server)
            .or_else(|| canonical.as_deref().and_then(url_scheme))
            .unwrap_or_else(|| "https".to_string())
    }

    pub fn canonical_server(&self) -> String {
        let configured = self
            .settings
            .optional_string("CanonicalServer")
            .unwrap_or_else(|| self.server());
        expand_origin(&configured, &self.default_protocol())
    }

    fn server_origin(&self) -> String {
        expand_origin(&self.server(), &self.default_protocol())
    }

    pub fn script(&self) -> String {
        self.settings.string_or("Script", DEFAULT_SCRIPT)
    }

    pub fn script_path(&self) -> String {
        self.settings.string_or("ScriptPath", "")
    }

    pub fn article_path(&self) -> Result<&ArticlePathShape, ConfigError> {
        cached(&self.article_path, || {
            let template = self.settings.string_or("ArticlePath", DEFAULT_ARTICLE_PATH);
            let shape = resolve_article_path(&template, &self.server(), &self.default_protocol());
            debug!(template = %template, ok = shape.is_ok(), "resolved article path");
            shape
        })
    }

    pub fn base_uri(&self) -> Result<&str, ConfigError> {
        self.article_path().map(|shape| shape.base_uri.as_str())
    }

    pub fn relative_link_prefix(&self) -> Result<&str, ConfigError> {
        self.article_path()
            .map(|shape| shape.relative_link_prefix.as_str())
    }

    pub fn interwiki_magic(&self) -> bool {
        self.settings.bool_or("InterwikiMagic", true)
    }

    pub fn interwiki_map(&self) -> &BTreeMap<String, InterwikiEntry> {
        self.interwiki_map.get_or_init(|| {
            let local_interwikis = self.settings.string_list("LocalInterwikis");
            let extra_language_prefixes = self.settings.string_list("ExtraInterlanguageLinkPrefixes");
            let origin = self.server_origin();
            let protocol = self.default_protocol();
            let site = InterwikiSite {
                server_origin: &origin,
                default_protocol: &protocol,
                local_interwikis: &local_interwikis,
                extra_language_prefixes: &extra_language_prefixes,
            };
            let rows = self.services.interwiki.all_prefixes();
            let map = build_interwiki_map(&rows, self.services.language_names.as_ref(), &site);
            debug!(rows = rows.len(), entries = map.len(), "built interwiki map");
            map
        })
    }

    pub fn lang(&self) -> String {
        self.settings
            .string_or("LanguageCode", DEFAULT_LANGUAGE_CODE)
    }

    pub fn lang_bcp47(&self) -> String {
        bcp47(&self.lang())
    }

    pub fn rtl(&self) -> bool {
        self.services.language.is_rtl()
    }

    pub fn ucfirst(&self, text: &str) -> String {
        self.services.language.ucfirst(text)
    }

    fn conversion_disabled(&self) -> bool {
        self.settings.bool_or("DisableLangConversion", false)
            || self.services.converters.is_conversion_disabled()
    }

    pub fn lang_converter_enabled(&self, code: &str) -> bool {
        !self.conversion_disabled()
            && self
                .services
                .converters
                .converter(code)
                .is_some_and(|converter| converter.has_variants())
    }

    pub fn variants(&self) -> &BTreeMap<String, VariantEntry> {
        self.variants.get_or_init(|| {
            let converters = self.services.converters.as_ref();
            let extra = self.settings.string_list("VariantLanguages");
            let candidates = variant_candidates(converters, &self.lang(), &extra);
            let variants = resolve_variants(
                converters,
                self.settings.bool_or("DisableLangConversion", false),
                &candidates,
            );
            debug!(
                candidates = candidates.len(),
                variants = variants.len(),
                "resolved language variants"
            );
            variants
        })
    }

    pub fn width_option(&self, explicit: Option<u32>) -> Result<u32, ConfigError> {
        resolve_width(
            explicit,
            self.services.user_options.as_ref(),
            self.settings.get(THUMB_LIMITS_SETTING),
        )
    }

    pub fn redirect_regexp(&self) -> Result<&CompiledMatcher, ConfigError> {
        cached(&self.redirect, || {
            let sets = self
                .services
                .magic_words
                .synonym_array(&[REDIRECT_MAGIC_WORD]);
            case_bucketed("redirect", &sets)
        })
    }

    pub fn bsw_regexp(&self) -> Result<&CompiledMatcher, ConfigError> {
        cached(&self.behavior_switches, || {
            let sets = self.services.magic_words.double_underscore_array();
            debug!(sets = sets.len(), "compiling behavior switch matcher");
            case_bucketed("behavior switch", &sets)
        })
    }

    pub fn category_regexp(&self) -> Result<&CompiledMatcher, ConfigError> {
        cached(&self.category, || {
            let group = self.namespace_alias_group(NS_CATEGORY);
            single_bucket("category", group.names())
        })
    }

    pub fn magic_word_matcher(&self, id: &str) -> Result<CompiledMatcher, ConfigError> {
        start_to_end(&self.services.magic_words.synonym_array(&[id]))
    }

    pub fn parameterized_alias_matcher(
        &self,
        ids: &[&str],
    ) -> Result<ParameterizedMatcher, ConfigError> {
        ParameterizedMatcher::compile(&self.services.magic_words.synonym_array(ids))
    }

    /// Magic word id -> synonyms, as the upstream table lists them.
    pub fn magic_word_aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.magic_word_index().aliases
    }

    /// Id of the magic word `alias` belongs to; case-insensitive words match any case.
    pub fn magic_word_canonical_name(&self, alias: &str) -> Option<&str> {
        let index = self.magic_word_index();
        index
            .sensitive
            .get(alias)
            .or_else(|| index.insensitive.get(&alias.to_lowercase()))
            .map(String::as_str)
    }

    fn magic_word_index(&self) -> &MagicWordIndex {
        self.magic_words.get_or_init(|| {
            let mut index = MagicWordIndex::default();
            let magic_words = self.services.magic_words.as_ref();
            for id in magic_words.ids() {
                if index.aliases.contains_key(&id) {
                    continue;
                }
                let mut synonyms = Vec::new();
                for set in magic_words.synonym_array(&[id.as_str()]) {
                    for synonym in set.synonyms {
                        let lookup = if set.case_sensitive {
                            index.sensitive.entry(synonym.clone())
                        } else {
                            index.insensitive.entry(synonym.to_lowercase())
                        };
                        lookup.or_insert_with(|| id.clone());
                        synonyms.push(synonym);
                    }
                }
                index.aliases.insert(id, synonyms);
            }
            debug!(words = index.aliases.len(), "indexed magic words");
            index
        })
    }

    pub fn canonical_namespace_id(&self, name: &str) -> Option<i32> {
        let key = name.trim().replace(' ', "_").to_lowercase();
        self.services.namespaces.canonical_index(&key)
    }

    pub fn namespace_id(&self, name: &str) -> Option<i32> {
        self.services.language.namespace_index(name)
    }

    /// Localized display name, spaces for underscores.
    pub fn namespace_name(&self, ns: i32) -> Option<String> {
        self.services
            .language
            .namespace_text(ns)
            .map(|text| text.replace('_', " "))
    }

    pub fn namespace_has_subpages(&self, ns: i32) -> bool {
        self.services.namespaces.has_subpages(ns)
    }

    pub fn namespace_case(&self, ns: i32) -> NamespaceCase {
        if self.services.namespaces.is_capitalized(ns) {
            NamespaceCase::FirstLetter
        } else {
            NamespaceCase::CaseSensitive
        }
    }

    pub fn namespace_is_talk(&self, ns: i32) -> bool {
        self.services.namespaces.is_talk(ns)
    }

    fn configured_namespace_aliases(&self) -> Vec<(String, i32)> {
        let Some(Value::Object(aliases)) = self.settings.get("NamespaceAliases") else {
            return Vec::new();
        };
        aliases
            .iter()
            .filter_map(|(name, ns)| {
                let ns = coerce_integer(ns).and_then(|ns| i32::try_from(ns).ok())?;
                Some((name.clone(), ns))
            })
            .collect()
    }

    /// Canonical name, localized name, language aliases, configured aliases.
    fn namespace_alias_group(&self, ns: i32) -> AliasGroup {
        let mut group = AliasGroup::default();
        if let Some(canonical) = self.services.namespaces.canonical_name(ns) {
            group.push(&canonical);
        }
        if let Some(local) = self.services.language.namespace_text(ns) {
            group.push(&local);
        }
        let language_aliases = self.services.language.namespace_aliases();
        let configured = self.configured_namespace_aliases();
        for (alias, _) in language_aliases
            .iter()
            .chain(configured.iter())
            .filter(|(_, id)| *id == ns)
        {
            group.push(alias);
        }
        group
    }

    /// Regex-quoted names of namespace `ns`; spaces and underscores interchangeable.
    pub fn namespace_alias_list(&self, ns: i32) -> Vec<String> {
        quoted_aliases(self.namespace_alias_group(ns).names())
    }

    pub fn special_ns_aliases(&self) -> Vec<String> {
        self.namespace_alias_list(NS_SPECIAL)
    }

    pub fn special_page_aliases(&self, page: &str) -> Vec<String> {
        let mut names = vec![page.to_string()];
        if let Some(aliases) = self.services.language.special_page_aliases(page) {
            names.extend(aliases);
        }
        names
    }

    pub fn special_page_local_name(&self, alias: &str) -> String {
        match self.services.special_pages.resolve_alias(alias) {
            Some((canonical, subpage)) => self
                .services
                .special_pages
                .local_name_for(&canonical, subpage.as_deref()),
            None => alias.to_string(),
        }
    }

    pub fn link_trail_regex(&self) -> Result<Option<CompiledMatcher>, ConfigError> {
        let trail = self.services.language.link_trail();
        let trail = trail.trim();
        let trail = trail.strip_suffix(LINK_TRAIL_REST).unwrap_or(trail);
        if trail.is_empty() || trail == EMPTY_LINK_TRAIL {
            return Ok(None);
        }
        CompiledMatcher::from_pattern("link trail", trail, "sD").map(Some)
    }

    pub fn link_prefix_regex(&self) -> Result<Option<CompiledMatcher>, ConfigError> {
        let language = &self.services.language;
        let charset = language.link_prefix_charset();
        if !language.link_prefix_extension() || charset.is_empty() {
            return Ok(None);
        }
        CompiledMatcher::from_pattern("link prefix", &format!("[{charset}]+$"), "Du").map(Some)
    }

    pub fn protocols(&self) -> Vec<String> {
        match self.settings.get("UrlProtocols") {
            Some(_) => self.settings.string_list("UrlProtocols"),
            None => DEFAULT_URL_PROTOCOLS
                .iter()
                .map(|item| (*item).to_string())
                .collect(),
        }
    }

    pub fn protocol_regexp(&self) -> Result<&CompiledMatcher, ConfigError> {
        cached(&self.protocols, || prefix_matcher("protocol", &self.protocols()))
    }

    pub fn has_valid_protocol(&self, url: &str) -> bool {
        self.protocol_regexp()
            .is_ok_and(|matcher| matcher.is_match(url))
    }

    pub fn max_template_depth(&self) -> Result<u32, ConfigError> {
        let depth = self
            .settings
            .integer_or("MaxTemplateDepth", DEFAULT_MAX_TEMPLATE_DEPTH)?;
        u32::try_from(depth).map_err(|_| ConfigError::InvalidSetting {
            name: "MaxTemplateDepth".to_string(),
            expected: "a non-negative integer",
        })
    }

    pub fn legal_title_chars(&self) -> String {
        self.settings
            .string_or("LegalTitleChars", DEFAULT_LEGAL_TITLE_CHARS)
    }

    /// Local time zone offset in minutes.
    pub fn timezone_offset(&self) -> Result<i32, ConfigError> {
        let offset = self.settings.integer_or("LocalTZoffset", 0)?;
        i32::try_from(offset).map_err(|_| ConfigError::InvalidSetting {
            name: "LocalTZoffset".to_string(),
            expected: "an offset in minutes",
        })
    }

    pub fn no_follow_config(&self) -> NoFollowConfig {
        NoFollowConfig {
            nofollow: self.settings.bool_or("NoFollowLinks", true),
            ns_exceptions: self
                .settings
                .string_list("NoFollowNsExceptions")
                .iter()
                .filter_map(|ns| ns.trim().parse().ok())
                .collect(),
            domain_exceptions: match self.settings.get("NoFollowDomainExceptions") {
                Some(_) => self.settings.string_list("NoFollowDomainExceptions"),
                None => vec!["mediawiki.org".to_string()],
            },
        }
    }

    pub fn external_link_target(&self) -> Option<String> {
        self.settings.optional_string("ExternalLinkTarget")
    }
}
