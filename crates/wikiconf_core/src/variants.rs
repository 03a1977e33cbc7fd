use std::collections::BTreeMap;

use serde::Serialize;

use crate::services::LanguageConverters;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantEntry {
    pub variant: String,
    pub base: String,
    pub fallbacks: Vec<String>,
}

/// Candidate base languages: upstream enumeration, then the content language,
/// then any extra configured codes. First occurrence wins the position.
pub fn variant_candidates(
    converters: &dyn LanguageConverters,
    content_language: &str,
    extra: &[String],
) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    let upstream = converters.languages_with_variants();
    let ordered = upstream
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(content_language))
        .chain(extra.iter().map(String::as_str));
    for code in ordered {
        if !code.is_empty() && !candidates.iter().any(|known| known == code) {
            candidates.push(code.to_string());
        }
    }
    candidates
}

/// Variant code -> base language and fallback chain.
///
/// Empty when conversion is disabled. A variant reachable from several bases
/// keeps the entry of the last candidate that reports it.
pub fn resolve_variants(
    converters: &dyn LanguageConverters,
    disabled_by_site: bool,
    candidates: &[String],
) -> BTreeMap<String, VariantEntry> {
    let mut variants = BTreeMap::new();
    if disabled_by_site || converters.is_conversion_disabled() {
        return variants;
    }

    for code in candidates {
        let Some(converter) = converters.converter(code) else {
            continue;
        };
        if !converter.has_variants() {
            continue;
        }
        for variant in &converter.variants {
            let entry = VariantEntry {
                variant: variant.clone(),
                base: code.clone(),
                fallbacks: converter.fallbacks_for(variant),
            };
            variants.insert(variant.clone(), entry);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::services::VariantConverter;

    struct Converters {
        disabled: bool,
        table: Vec<VariantConverter>,
    }

    impl LanguageConverters for Converters {
        fn is_conversion_disabled(&self) -> bool {
            self.disabled
        }

        fn languages_with_variants(&self) -> Vec<String> {
            self.table.iter().map(|c| c.code.clone()).collect()
        }

        fn converter(&self, code: &str) -> Option<VariantConverter> {
            self.table.iter().find(|c| c.code == code).cloned()
        }
    }

    fn converter(code: &str, variants: &[&str], fallbacks: &[(&str, &[&str])]) -> VariantConverter {
        VariantConverter {
            code: code.to_string(),
            variants: variants.iter().map(|v| (*v).to_string()).collect(),
            fallbacks: fallbacks
                .iter()
                .map(|(variant, chain)| {
                    (
                        (*variant).to_string(),
                        chain.iter().map(|c| (*c).to_string()).collect(),
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn zh_and_sr() -> Converters {
        Converters {
            disabled: false,
            table: vec![
                converter(
                    "zh",
                    &["zh", "zh-hans", "zh-hant"],
                    &[("zh-hans", &["zh-cn", "zh-sg"]), ("zh-hant", &["zh-tw"])],
                ),
                converter("sr", &["sr", "sr-ec", "sr-el"], &[("sr-el", &["sr-ec"])]),
                converter("en", &["en"], &[]),
            ],
        }
    }

    #[test]
    fn variants_map_to_base_and_fallbacks() {
        let converters = zh_and_sr();
        let candidates = variant_candidates(&converters, "en", &[]);
        let variants = resolve_variants(&converters, false, &candidates);

        assert_eq!(variants.len(), 6);
        assert_eq!(variants["zh-hans"].base, "zh");
        assert_eq!(variants["zh-hans"].fallbacks, vec!["zh-cn", "zh-sg"]);
        assert_eq!(variants["sr-el"].fallbacks, vec!["sr-ec"]);
        assert_eq!(variants["sr-ec"].fallbacks, vec!["sr"]);
        assert!(!variants.contains_key("en"));
    }

    #[test]
    fn disabled_conversion_yields_nothing() {
        let mut converters = zh_and_sr();
        let candidates = variant_candidates(&converters, "zh", &[]);
        assert!(resolve_variants(&converters, true, &candidates).is_empty());

        converters.disabled = true;
        assert!(resolve_variants(&converters, false, &candidates).is_empty());
    }

    #[test]
    fn unknown_candidates_are_skipped() {
        let converters = zh_and_sr();
        let candidates = vec!["xx".to_string(), "sr".to_string()];
        let variants = resolve_variants(&converters, false, &candidates);
        assert_eq!(variants.len(), 3);
        assert!(variants.values().all(|entry| entry.base == "sr"));
    }

    #[test]
    fn later_candidates_overwrite_shared_variants() {
        let converters = Converters {
            disabled: false,
            table: vec![
                converter("a", &["a", "shared"], &[("shared", &["a"])]),
                converter("b", &["b", "shared"], &[("shared", &["b"])]),
            ],
        };
        let forward = vec!["a".to_string(), "b".to_string()];
        let backward = vec!["b".to_string(), "a".to_string()];
        assert_eq!(resolve_variants(&converters, false, &forward)["shared"].base, "b");
        assert_eq!(resolve_variants(&converters, false, &backward)["shared"].base, "a");
    }

    #[test]
    fn candidates_follow_upstream_order_without_duplicates() {
        let converters = zh_and_sr();
        let extra = vec!["kk".to_string(), "zh".to_string()];
        assert_eq!(
            variant_candidates(&converters, "sr", &extra),
            vec!["zh", "sr", "en", "kk"]
        );
    }
}
