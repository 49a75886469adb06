//! Lexical search over entity names, descriptions and fields.
//!
//! Ranking is deliberately simple token overlap: callers that want semantic
//! ranking put their own index in front of the catalog.

use std::collections::BTreeMap;

use serde::Serialize;

use super::entity::Entity;

const WEIGHT_NAME: u32 = 3;
const WEIGHT_SYNONYM: u32 = 2;
const WEIGHT_TEXT: u32 = 1;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub id: String,
    pub description: Option<String>,
    pub score: u32,
}

/// Token index built once at catalog load.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    /// entity id -> token -> best weight for that token
    postings: BTreeMap<String, BTreeMap<String, u32>>,
    descriptions: BTreeMap<String, Option<String>>,
}

impl SearchIndex {
    pub fn build<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Self {
        let mut index = SearchIndex::default();
        for entity in entities {
            let mut tokens: BTreeMap<String, u32> = BTreeMap::new();
            let mut add = |text: &str, weight: u32| {
                for token in tokenize(text) {
                    let slot = tokens.entry(token).or_insert(0);
                    *slot = (*slot).max(weight);
                }
            };

            add(&entity.id, WEIGHT_NAME);
            add(&entity.table, WEIGHT_NAME);
            entity.synonyms.iter().for_each(|s| add(s, WEIGHT_SYNONYM));
            if let Some(description) = &entity.description {
                add(description, WEIGHT_TEXT);
            }
            entity.field_names().for_each(|f| add(f, WEIGHT_TEXT));

            index.postings.insert(entity.id.clone(), tokens);
            index
                .descriptions
                .insert(entity.id.clone(), entity.description.clone());
        }
        index
    }

    /// Entities sharing at least one token with `query`, best first.
    /// Equal scores are ordered by entity id.
    pub fn search(&self, query: &str) -> Vec<EntitySummary> {
        let mut terms = tokenize(query);
        terms.sort();
        terms.dedup();

        let mut hits: Vec<EntitySummary> = self
            .postings
            .iter()
            .filter_map(|(id, tokens)| {
                let score: u32 = terms.iter().filter_map(|t| tokens.get(t)).sum();
                (score > 0).then(|| EntitySummary {
                    id: id.clone(),
                    description: self.descriptions.get(id).cloned().flatten(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits
    }
}

/// Lowercase alphanumeric runs, with camelCase and snake_case split and
/// simple plurals folded to the singular.
fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut words);
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            flush(&mut current, &mut words);
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    flush(&mut current, &mut words);
    words
}

fn flush(current: &mut String, words: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let mut word = std::mem::take(current);
    if word.len() > 4 && word.ends_with("ies") {
        word.truncate(word.len() - 3);
        word.push('y');
    } else if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        word.pop();
    }
    words.push(word);
}
