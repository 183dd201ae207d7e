//! Label matching against a resource's label map. Four matcher kinds:
//! exact string equality, shell-style glob, full regex, and a trait
//! template (`{{internal.team}}`) expanded against the acting user's
//! traits before being compared as an exact match.

use meridian_core::model::{LabelMatcher, Traits};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static GLOB_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.+()^$]").unwrap());

fn glob_to_regex(pattern: &str) -> Regex {
    let escaped = GLOB_SPECIAL.replace_all(pattern, r"\$0");
    let translated = escaped.replace('*', ".*").replace('?', ".");
    Regex::new(&format!("^{translated}$")).unwrap_or_else(|_| Regex::new("$^").unwrap())
}

/// Expands `{{internal.foo}}` / `{{external.foo}}` placeholders in
/// `template` against `traits`, joining multi-valued traits with a comma.
/// Unknown trait names expand to the empty string.
pub fn expand_template(template: &str, traits: &Traits) -> String {
    static PLACEHOLDER: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\{\{\s*(?:internal|external)\.([A-Za-z0-9_-]+)\s*\}\}").unwrap());

    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let key = &caps[1];
            traits
                .get(key)
                .map(|values| values.join(","))
                .unwrap_or_default()
        })
        .into_owned()
}

pub fn matches_label_map(
    matchers: &[LabelMatcher],
    labels: &BTreeMap<String, String>,
    traits: &Traits,
) -> bool {
    matchers.iter().all(|m| matches_label(m, labels, traits))
}

pub fn matches_label(matcher: &LabelMatcher, labels: &BTreeMap<String, String>, traits: &Traits) -> bool {
    match matcher {
        LabelMatcher::Exact { key, value } => labels.get(key).map(|v| v == value).unwrap_or(false),
        LabelMatcher::Glob { key, pattern } => labels
            .get(key)
            .map(|v| glob_to_regex(pattern).is_match(v))
            .unwrap_or(false),
        LabelMatcher::Regex { key, pattern } => Regex::new(pattern)
            .ok()
            .zip(labels.get(key))
            .map(|(re, v)| re.is_match(v))
            .unwrap_or(false),
        LabelMatcher::Template { key, template } => {
            let expanded = expand_template(template, traits);
            labels.get(key).map(|v| v == &expanded).unwrap_or(false)
        }
    }
}
