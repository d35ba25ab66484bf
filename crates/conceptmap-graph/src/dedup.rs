//! Concept deduplication.
//!
//! Two concepts are the same candidate when any canonical key of one (label or
//! alias) equals a canonical key of the other. The earliest record wins and
//! absorbs later duplicates: aliases and evidence are unioned, the tier is
//! promoted, a missing definition is filled in. Nothing from an input record is
//! dropped.
//!
//! Ids are reassigned from the surviving label. Collisions between slugs get a
//! short hash suffix derived from the internal key, so identical input always
//! produces identical ids.

use crate::canonical::{canonicalize, short_hash, slugify};
use crate::model::Concept;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Result of [`dedupe_concepts_with_map`].
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub concepts: Vec<Concept>,
    /// Pre-dedup concept id -> id of the concept that absorbed it.
    pub id_map: BTreeMap<String, String>,
}

/// Deduplicate concepts, keeping first-seen order.
pub fn dedupe_concepts(concepts: Vec<Concept>) -> Vec<Concept> {
    dedupe_concepts_with_map(concepts).concepts
}

/// Deduplicate concepts and report where every input id ended up.
///
/// A candidate whose keys hit several representatives joins them all: the
/// later representatives are folded into the earliest one.
pub fn dedupe_concepts_with_map(concepts: Vec<Concept>) -> DedupOutcome {
    let input_len = concepts.len();
    let mut slots: Vec<Option<(Concept, String)>> = Vec::new();
    let mut parent: Vec<usize> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut origins: Vec<(String, usize)> = Vec::with_capacity(input_len);

    for concept in concepts {
        let keys = concept_keys(&concept);
        let mut hits: Vec<usize> = keys
            .iter()
            .filter_map(|k| by_key.get(k).map(|&i| root(&parent, i)))
            .collect();
        hits.sort_unstable();
        hits.dedup();

        let idx = match hits.split_first() {
            Some((&target, rest)) => {
                origins.push((concept.id.clone(), target));
                if let Some((rep, _)) = slots[target].as_mut() {
                    debug!(
                        candidate = %concept.label,
                        representative = %rep.label,
                        "merging duplicate concept"
                    );
                    absorb(rep, concept);
                }
                for &other in rest {
                    if let Some((joined, _)) = slots[other].take() {
                        if let Some((rep, _)) = slots[target].as_mut() {
                            debug!(joined = %joined.label, representative = %rep.label, "joining representatives");
                            absorb(rep, joined);
                        }
                    }
                    parent[other] = target;
                }
                target
            }
            None => {
                let idx = slots.len();
                let internal_key = match canonicalize(&concept.label) {
                    k if !k.is_empty() => k,
                    _ => format!("#{}", short_hash(&concept.id, 32)),
                };
                by_key.entry(internal_key.clone()).or_insert(idx);
                origins.push((concept.id.clone(), idx));
                slots.push(Some((concept, internal_key)));
                parent.push(idx);
                idx
            }
        };
        for key in keys {
            by_key.entry(key).or_insert(idx);
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut final_ids: Vec<Option<String>> = vec![None; slots.len()];
    let mut reps = Vec::with_capacity(slots.len());
    for (idx, slot) in slots.into_iter().enumerate() {
        let Some((mut rep, key)) = slot else {
            continue;
        };
        rep.aliases = distinct_names(std::mem::take(&mut rep.aliases));
        let id = unique_id(&rep.label, &key, &seen);
        seen.insert(id.clone());
        final_ids[idx] = Some(id.clone());
        rep.id = id;
        reps.push(rep);
    }

    let mut id_map = BTreeMap::new();
    for (input_id, idx) in origins {
        if input_id.is_empty() {
            continue;
        }
        if let Some(id) = &final_ids[root(&parent, idx)] {
            id_map.entry(input_id).or_insert_with(|| id.clone());
        }
    }

    debug!(input = input_len, output = reps.len(), "deduplicated concepts");
    DedupOutcome {
        concepts: reps,
        id_map,
    }
}

fn root(parent: &[usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        idx = parent[idx];
    }
    idx
}

fn concept_keys(concept: &Concept) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for name in concept.names() {
        let key = canonicalize(name);
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn absorb(base: &mut Concept, candidate: Concept) {
    let Concept {
        label,
        aliases,
        definition,
        tier,
        evidence,
        extra,
        ..
    } = candidate;

    let surface_forms: Vec<String> = base
        .aliases
        .drain(..)
        .chain(std::iter::once(base.label.clone()))
        .chain(std::iter::once(label))
        .chain(aliases)
        .collect();
    let mut names = distinct_names(surface_forms);
    names.sort();
    base.aliases = names;

    base.evidence.extend(evidence);
    base.tier = base.tier.promote(tier);

    let base_has_definition = base
        .definition
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    if !base_has_definition {
        if let Some(def) = definition.filter(|d| !d.trim().is_empty()) {
            base.definition = Some(def);
        }
    }

    for (k, v) in extra {
        base.extra.entry(k).or_insert(v);
    }
}

/// One spelling per canonical key, first seen wins; names with an empty key go.
fn distinct_names(names: Vec<String>) -> Vec<String> {
    let mut keys: HashSet<String> = HashSet::new();
    names
        .into_iter()
        .filter(|name| {
            let key = canonicalize(name);
            !key.is_empty() && keys.insert(key)
        })
        .collect()
}

fn unique_id(label: &str, internal_key: &str, taken: &HashSet<String>) -> String {
    let mut id = slugify(label);
    if id.is_empty() {
        id = format!("c_{}", short_hash(internal_key, 8));
    }
    if taken.contains(&id) {
        id = format!("{}_{}", id, short_hash(internal_key, 4));
    }
    let base = id.clone();
    let mut n = 2;
    while taken.contains(&id) {
        id = format!("{base}_{n}");
        n += 1;
    }
    id
}

/// Label -> concept id lookup over a deduplicated concept set.
///
/// Oracle relations name their endpoints by label; this binds such a label (or
/// any alias, or the id itself) to the concept that owns its canonical key.
#[derive(Debug, Clone, Default)]
pub struct ConceptIndex {
    by_key: HashMap<String, String>,
    ids: HashSet<String>,
}

impl ConceptIndex {
    pub fn new(concepts: &[Concept]) -> Self {
        let mut by_key = HashMap::new();
        let mut ids = HashSet::new();
        for concept in concepts {
            ids.insert(concept.id.clone());
            for name in concept.names() {
                let key = canonicalize(name);
                if !key.is_empty() {
                    by_key.entry(key).or_insert_with(|| concept.id.clone());
                }
            }
        }
        Self { by_key, ids }
    }

    pub fn resolve(&self, label: &str) -> Option<&str> {
        if let Some(id) = self.by_key.get(&canonicalize(label)) {
            return Some(id.as_str());
        }
        self.ids.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
