use std::collections::BTreeMap;

use serde::Serialize;

use crate::article_path::ArticlePathShape;
use crate::error::ConfigError;
use crate::interwiki::InterwikiEntry;
use crate::matcher::CompiledMatcher;
use crate::services::{NS_CATEGORY, NS_FILE, NS_MAIN, NS_SPECIAL, NS_TEMPLATE};
use crate::site_config::{GalleryOptions, NamespaceCase, NoFollowConfig, SiteConfig};
use crate::variants::VariantEntry;

/// Namespaces described in a site report.
pub const REPORTED_NAMESPACES: [i32; 5] = [NS_SPECIAL, NS_MAIN, NS_FILE, NS_TEMPLATE, NS_CATEGORY];

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceSummary {
    pub id: i32,
    pub name: Option<String>,
    pub case: NamespaceCase,
    pub subpages: bool,
    pub talk: bool,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub redirect: CompiledMatcher,
    pub behavior_switches: CompiledMatcher,
    pub category: CompiledMatcher,
    pub protocols: CompiledMatcher,
    pub link_trail: Option<CompiledMatcher>,
    pub link_prefix: Option<CompiledMatcher>,
}

/// Every derived artifact of one configuration snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SiteReport {
    pub fingerprint: String,
    pub server: String,
    pub canonical_server: String,
    pub default_protocol: String,
    pub script: String,
    pub script_path: String,
    pub article_path: ArticlePathShape,
    pub lang: String,
    pub lang_bcp47: String,
    pub rtl: bool,
    pub interwiki_magic: bool,
    pub interwiki: BTreeMap<String, InterwikiEntry>,
    pub variants: BTreeMap<String, VariantEntry>,
    pub patterns: PatternSummary,
    pub namespaces: Vec<NamespaceSummary>,
    pub gallery: GalleryOptions,
    pub no_follow: NoFollowConfig,
    pub allowed_external_image_prefixes: Vec<String>,
    pub max_template_depth: u32,
    pub timezone_offset: i32,
    pub external_link_target: Option<String>,
}

pub fn namespace_summary(config: &SiteConfig, ns: i32) -> NamespaceSummary {
    NamespaceSummary {
        id: ns,
        name: config.namespace_name(ns),
        case: config.namespace_case(ns),
        subpages: config.namespace_has_subpages(ns),
        talk: config.namespace_is_talk(ns),
        aliases: config.namespace_alias_list(ns),
    }
}

pub fn collect_report(config: &SiteConfig, fingerprint: &str) -> Result<SiteReport, ConfigError> {
    let patterns = PatternSummary {
        redirect: config.redirect_regexp()?.clone(),
        behavior_switches: config.bsw_regexp()?.clone(),
        category: config.category_regexp()?.clone(),
        protocols: config.protocol_regexp()?.clone(),
        link_trail: config.link_trail_regex()?,
        link_prefix: config.link_prefix_regex()?,
    };

    Ok(SiteReport {
        fingerprint: fingerprint.to_string(),
        server: config.server(),
        canonical_server: config.canonical_server(),
        default_protocol: config.default_protocol(),
        script: config.script(),
        script_path: config.script_path(),
        article_path: config.article_path()?.clone(),
        lang: config.lang(),
        lang_bcp47: config.lang_bcp47(),
        rtl: config.rtl(),
        interwiki_magic: config.interwiki_magic(),
        interwiki: config.interwiki_map().clone(),
        variants: config.variants().clone(),
        patterns,
        namespaces: REPORTED_NAMESPACES
            .iter()
            .map(|ns| namespace_summary(config, *ns))
            .collect(),
        gallery: config.gallery_options()?,
        no_follow: config.no_follow_config(),
        allowed_external_image_prefixes: config.allowed_external_image_prefixes(),
        max_template_depth: config.max_template_depth()?,
        timezone_offset: config.timezone_offset()?,
        external_link_target: config.external_link_target(),
    })
}
