//! Result filtering, de-duplication and ordering.
//!
//! The upstream returns near-matches beyond the requested scope (neighbouring
//! regions, similarly named places). Records are kept when every rule whose
//! parameter was supplied matches exactly after normalization. If that leaves
//! nothing and the lookup is lenient, a fuzzy pass accepts containment in
//! either direction or a shared significant token.

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{EndpointConfig, MatchPolicy, MatchRule, OrderPolicy};

use super::types::LookupParams;

/// Minimum length of a token that counts towards a fuzzy match.
const SIGNIFICANT_TOKEN_LEN: usize = 3;

/// Lowercase and collapse runs of whitespace.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// String form of a scalar record field.
fn field_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn significant_tokens(value: &str) -> HashSet<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= SIGNIFICANT_TOKEN_LEN)
        .map(str::to_lowercase)
        .collect()
}

fn active_rules<'a>(
    rules: &'a [MatchRule],
    params: &'a LookupParams,
) -> impl Iterator<Item = (&'a MatchRule, String)> + 'a {
    rules
        .iter()
        .filter_map(move |rule| params.get(&rule.param).map(|v| (rule, normalize(v))))
}

pub fn exact_match(record: &Value, rules: &[MatchRule], params: &LookupParams) -> bool {
    active_rules(rules, params).all(|(rule, wanted)| {
        field_text(record, &rule.field).is_some_and(|have| normalize(&have) == wanted)
    })
}

/// Looser comparison. A record that lacks a rule's field is not rejected by it.
pub fn fuzzy_match(record: &Value, rules: &[MatchRule], params: &LookupParams) -> bool {
    active_rules(rules, params).all(|(rule, wanted)| {
        let Some(have) = field_text(record, &rule.field) else {
            return true;
        };
        let have = normalize(&have);
        if have.contains(&wanted) || wanted.contains(&have) {
            return true;
        }
        !significant_tokens(&have).is_disjoint(&significant_tokens(&wanted))
    })
}

/// Whether the fuzzy pass applies to this request.
pub fn is_lenient(policy: &MatchPolicy, params: &LookupParams) -> bool {
    if policy.lenient {
        return true;
    }
    let Some(partition) = policy
        .partition_param
        .as_deref()
        .and_then(|p| params.get(p))
    else {
        return false;
    };
    policy
        .lenient_partitions
        .iter()
        .any(|p| p.eq_ignore_ascii_case(partition.trim()))
}

/// Records matching `params` under the endpoint's policy, de-duplicated and
/// in deterministic order.
pub fn select(records: &[Value], endpoint: &EndpointConfig, params: &LookupParams) -> Vec<Value> {
    let rules = &endpoint.matching.rules;

    let mut selected: Vec<Value> = records
        .iter()
        .filter(|r| exact_match(r, rules, params))
        .cloned()
        .collect();

    if selected.is_empty() && !records.is_empty() && is_lenient(&endpoint.matching, params) {
        selected = records
            .iter()
            .filter(|r| fuzzy_match(r, rules, params))
            .cloned()
            .collect();
        tracing::debug!(
            candidates = records.len(),
            matched = selected.len(),
            "Exact match empty, applied fuzzy pass"
        );
    }

    let mut selected = dedupe(selected, endpoint.dedupe_field.as_deref());
    sort_records(&mut selected, &endpoint.order);
    selected
}

/// Keep the first record for each identity.
pub fn dedupe(records: Vec<Value>, field: Option<&str>) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let identity = match field.and_then(|f| field_text(record, f)) {
                Some(value) => normalize(&value),
                None => record.to_string(),
            };
            seen.insert(identity)
        })
        .collect()
}

pub fn sort_records(records: &mut [Value], order: &OrderPolicy) {
    match order {
        OrderPolicy::Upstream => {}
        OrderPolicy::Name { field } => {
            records.sort_by(|a, b| compare_text(a, b, field));
        }
        OrderPolicy::WeightDesc { field, tie_break } => {
            records.sort_by(|a, b| {
                weight(b, field)
                    .total_cmp(&weight(a, field))
                    .then_with(|| compare_text(a, b, tie_break))
            });
        }
    }
}

/// Sort key with case and diacritics folded, so "Île-de-France" sorts
/// among the I's.
fn collation_key(value: &str) -> String {
    normalize(value)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Accent- and case-insensitive ordering. Ties fall back to the lowercased
/// text and then the raw text so the result is total.
fn compare_text(a: &Value, b: &Value, field: &str) -> Ordering {
    let a = field_text(a, field).unwrap_or_default();
    let b = field_text(b, field).unwrap_or_default();
    collation_key(&a)
        .cmp(&collation_key(&b))
        .then_with(|| normalize(&a).cmp(&normalize(&b)))
        .then_with(|| a.cmp(&b))
}

/// Numeric weight; absent or unparseable weights sort last.
fn weight(record: &Value, field: &str) -> f64 {
    match record.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NEG_INFINITY),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(f64::NEG_INFINITY),
        _ => f64::NEG_INFINITY,
    }
}
