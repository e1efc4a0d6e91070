use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::core::fqn;

pub const NAME_WEIGHT: u32 = 10;
pub const FQN_WEIGHT: u32 = 5;
pub const CHILD_WEIGHT: u32 = 5;

/// Completion-suggester entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSuggest {
    pub input: String,
    pub weight: u32,
}

impl SearchSuggest {
    pub fn new(input: impl Into<String>, weight: u32) -> Self {
        SearchSuggest {
            input: input.into(),
            weight,
        }
    }
}

/// Name first (heavier), then the fully-qualified name.
pub fn entity_suggestions(name: &str, fully_qualified_name: &str) -> Vec<SearchSuggest> {
    let mut suggest = Vec::with_capacity(2);
    if !name.is_empty() {
        suggest.push(SearchSuggest::new(name, NAME_WEIGHT));
    }
    if !fully_qualified_name.is_empty() {
        suggest.push(SearchSuggest::new(fully_qualified_name, FQN_WEIGHT));
    }
    suggest
}

/// Every prefix, suffix and single part of `fqn`, plus the suggestion inputs.
///
/// Sorted so that two builds of the same entity produce identical documents.
pub fn fqn_parts(fully_qualified_name: &str, suggest: &[SearchSuggest]) -> Vec<String> {
    let mut parts: BTreeSet<String> = BTreeSet::new();
    let split = fqn::split(fully_qualified_name);
    if !fully_qualified_name.is_empty() {
        parts.insert(fully_qualified_name.to_string());
    }
    for i in 0..split.len() {
        parts.insert(split[i].clone());
        parts.insert(fqn::unquote_name(&split[i]));
        parts.insert(fqn::build(&split[..=i]));
        parts.insert(fqn::build(&split[i..]));
    }
    for entry in suggest {
        parts.insert(entry.input.clone());
    }
    parts.remove("");
    parts.into_iter().collect()
}

/// Suggestions from the `name` of every element of `list`, descending into `children`.
pub fn child_name_suggestions(list: Option<&Value>) -> Vec<SearchSuggest> {
    let mut names: BTreeSet<String> = BTreeSet::new();
    collect_names(list, &mut names);
    names
        .into_iter()
        .map(|name| SearchSuggest::new(name, CHILD_WEIGHT))
        .collect()
}

fn collect_names(list: Option<&Value>, names: &mut BTreeSet<String>) {
    let Some(items) = list.and_then(Value::as_array) else {
        return;
    };
    for item in items {
        if let Some(name) = item.get("name").and_then(Value::as_str) {
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
        collect_names(item.get("children"), names);
    }
}
