//! Compiles synonym and alias sets into case-aware alternation regexes.
//!
//! Source patterns are kept in the PCRE-compatible text form consumed by the
//! content pipeline. The same structure is compiled with the `regex` crate for
//! in-process matching; the only dialect difference is the never-matching
//! placeholder, which `regex` cannot express as a lookahead.

use regex::{Match, Regex, RegexBuilder};
use serde::{Serialize, Serializer};

use crate::error::ConfigError;
use crate::services::SynonymSet;

/// Placeholder for an empty bucket: keeps the group present but never matches.
pub const NEVER_MATCH: &str = "(?!)";
const NEVER_MATCH_COMPILED: &str = r"\b\B";
pub const BUCKETED_MODIFIERS: &str = "Su";
pub const PLACEHOLDER: &str = "$1";

#[derive(Debug, Clone)]
pub struct CompiledMatcher {
    source: String,
    modifiers: &'static str,
    regex: Regex,
}

impl CompiledMatcher {
    fn compile(
        what: &'static str,
        source: String,
        modifiers: &'static str,
        compiled: &str,
    ) -> Result<Self, ConfigError> {
        let regex = build_regex(compiled).map_err(|error| ConfigError::pattern(what, error))?;
        Ok(Self {
            source,
            modifiers,
            regex,
        })
    }

    /// Wrap an upstream-supplied pattern that is already valid in both dialects.
    pub fn from_pattern(
        what: &'static str,
        pattern: &str,
        modifiers: &'static str,
    ) -> Result<Self, ConfigError> {
        Self::compile(what, pattern.to_string(), modifiers, pattern)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn modifiers(&self) -> &'static str {
        self.modifiers
    }

    /// Source wrapped in delimiters with trailing modifiers, e.g. `@...@Su`.
    pub fn delimited(&self, delimiter: char) -> String {
        format!("{delimiter}{}{delimiter}{}", self.source, self.modifiers)
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn find<'t>(&self, text: &'t str) -> Option<Match<'t>> {
        self.regex.find(text)
    }
}

impl Serialize for CompiledMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct View<'a> {
            pattern: &'a str,
            modifiers: &'a str,
        }
        View {
            pattern: &self.source,
            modifiers: self.modifiers,
        }
        .serialize(serializer)
    }
}

fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .dot_matches_new_line(true)
        .unicode(true)
        .build()
}

fn alternation(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join("|")
    }
}

/// `(?i:<insensitive>)|<sensitive>` over the given sets, in source order.
pub fn case_bucketed(what: &'static str, sets: &[SynonymSet]) -> Result<CompiledMatcher, ConfigError> {
    let (insensitive, sensitive) = case_buckets(sets);

    let source = format!(
        "(?i:{})|{}",
        alternation(&quote_all(&insensitive, quote_pcre), NEVER_MATCH),
        alternation(&quote_all(&sensitive, quote_pcre), NEVER_MATCH)
    );
    let compiled = format!(
        "(?i:{})|{}",
        alternation(&quote_all(&insensitive, regex::escape), NEVER_MATCH_COMPILED),
        alternation(&quote_all(&sensitive, regex::escape), NEVER_MATCH_COMPILED)
    );
    CompiledMatcher::compile(what, source, BUCKETED_MODIFIERS, &compiled)
}

/// Split synonyms into case-insensitive and case-sensitive buckets, source order kept.
fn case_buckets(sets: &[SynonymSet]) -> (Vec<&str>, Vec<&str>) {
    let mut insensitive = Vec::new();
    let mut sensitive = Vec::new();
    for set in sets {
        let bucket = if set.case_sensitive {
            &mut sensitive
        } else {
            &mut insensitive
        };
        bucket.extend(set.synonyms.iter().map(String::as_str));
    }
    (insensitive, sensitive)
}

fn quote_all(items: &[&str], quote: impl Fn(&str) -> String) -> Vec<String> {
    items.iter().map(|item| quote(item)).collect()
}

/// Quote text the way PCRE-consuming code expects (`preg_quote` without a delimiter).
pub fn quote_pcre(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '.' | '\\' | '+' | '*' | '?' | '[' | '^' | ']' | '$' | '(' | ')' | '{' | '}' | '='
            | '!' | '<' | '>' | '|' | ':' | '-' | '#' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            '\0' => quoted.push_str("\\000"),
            _ => quoted.push(ch),
        }
    }
    quoted
}

/// Names for one namespace or page: canonical name first, then aliases in
/// the order they were added. Duplicates are dropped by exact string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AliasGroup {
    names: Vec<String>,
}

impl AliasGroup {
    pub fn new(canonical: &str) -> Self {
        let mut group = Self::default();
        group.push(canonical);
        group
    }

    pub fn push(&mut self, alias: &str) {
        if !alias.is_empty() && !self.names.iter().any(|name| name == alias) {
            self.names.push(alias.to_string());
        }
    }

    pub fn canonical(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Spaces and underscores in titles match each other.
fn underscores_or_spaces(quoted: &str) -> String {
    quoted.replace([' ', '_'], "[ _]")
}

fn dedup_quoted(aliases: &[&str], quote: impl Fn(&str) -> String) -> Vec<String> {
    let mut quoted: Vec<String> = Vec::new();
    for alias in aliases {
        let candidate = underscores_or_spaces(&quote(alias));
        if !quoted.contains(&candidate) {
            quoted.push(candidate);
        }
    }
    quoted
}

/// PCRE-quote every alias, dropping exact duplicates after quoting.
pub fn quoted_aliases<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let aliases: Vec<&str> = aliases.into_iter().collect();
    dedup_quoted(&aliases, quote_pcre)
}

/// `(?i:a|b|c)` over quoted aliases; the compiled form matches whole names only.
pub fn single_bucket<'a>(
    what: &'static str,
    aliases: impl IntoIterator<Item = &'a str>,
) -> Result<CompiledMatcher, ConfigError> {
    let aliases: Vec<&str> = aliases.into_iter().collect();
    let source = format!(
        "(?i:{})",
        alternation(&dedup_quoted(&aliases, quote_pcre), NEVER_MATCH)
    );
    let compiled = format!(
        "^(?i:{})$",
        alternation(&dedup_quoted(&aliases, regex::escape), NEVER_MATCH_COMPILED)
    );
    CompiledMatcher::compile(what, source, "u", &compiled)
}

/// Whole-string matcher for one magic word over all of its rows; an unknown
/// word never matches.
pub fn start_to_end(sets: &[SynonymSet]) -> Result<CompiledMatcher, ConfigError> {
    let (insensitive, sensitive) = case_buckets(sets);
    let body = |quote: fn(&str) -> String, never: &str| {
        let insensitive = quote_all(&insensitive, quote);
        let sensitive = quote_all(&sensitive, quote);
        match (insensitive.is_empty(), sensitive.is_empty()) {
            (false, true) => format!("^(?i:{})$", insensitive.join("|")),
            (true, _) => format!("^(?:{})$", alternation(&sensitive, never)),
            (false, false) => format!(
                "^(?:(?i:{})|{})$",
                insensitive.join("|"),
                sensitive.join("|")
            ),
        }
    };
    let source = body(quote_pcre, NEVER_MATCH);
    let compiled = body(escape_regex, NEVER_MATCH_COMPILED);
    CompiledMatcher::compile("magic word", source, "u", &compiled)
}

fn escape_regex(text: &str) -> String {
    regex::escape(text)
}

/// Matches a URL that begins with any of `prefixes`, ignoring case.
pub fn prefix_matcher(what: &'static str, prefixes: &[String]) -> Result<CompiledMatcher, ConfigError> {
    let prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
    let source = format!(
        "^(?i:{})",
        alternation(&quote_all(&prefixes, quote_pcre), NEVER_MATCH)
    );
    let compiled = format!(
        "^(?i:{})",
        alternation(&quote_all(&prefixes, regex::escape), NEVER_MATCH_COMPILED)
    );
    CompiledMatcher::compile(what, source, "", &compiled)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasMatch {
    pub key: String,
    pub value: String,
}

/// Matches `thumb=$1`-style synonyms and reports the id and captured value.
#[derive(Debug, Clone, Default)]
pub struct ParameterizedMatcher {
    entries: Vec<(String, Regex)>,
}

impl ParameterizedMatcher {
    pub fn compile(sets: &[SynonymSet]) -> Result<Self, ConfigError> {
        let mut entries = Vec::with_capacity(sets.len());
        for set in sets {
            let alternatives: Vec<String> = set
                .synonyms
                .iter()
                .filter_map(|synonym| split_placeholder(synonym))
                .enumerate()
                .map(|(index, (before, after))| format!("{before}(?P<v{index}>.*?){after}"))
                .collect();
            if alternatives.is_empty() {
                continue;
            }
            let body = alternatives.join("|");
            let pattern = if set.case_sensitive {
                format!("^(?:{body})$")
            } else {
                format!("^(?i:{body})$")
            };
            let regex = build_regex(&pattern)
                .map_err(|error| ConfigError::pattern("parameterized alias", error))?;
            entries.push((set.id.clone(), regex));
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn matches(&self, text: &str) -> Option<AliasMatch> {
        for (key, regex) in &self.entries {
            let Some(captures) = regex.captures(text) else {
                continue;
            };
            if let Some(value) = captures.iter().skip(1).flatten().next() {
                return Some(AliasMatch {
                    key: key.clone(),
                    value: value.as_str().to_string(),
                });
            }
        }
        None
    }

    pub fn into_fn(self) -> impl Fn(&str) -> Option<AliasMatch> + Send + Sync {
        move |text| self.matches(text)
    }
}

fn split_placeholder(synonym: &str) -> Option<(String, String)> {
    if synonym.matches(PLACEHOLDER).count() != 1 {
        return None;
    }
    let (before, after) = synonym.split_once(PLACEHOLDER)?;
    Some((regex::escape(before), regex::escape(after)))
}
