//! Fact validation and confidence-based reconciliation.
//!
//! New facts are compared key by key, in processing order, against the
//! facts already stored for a brain *and* against facts staged earlier in
//! the same pass. A candidate only displaces a stored or staged fact when
//! its confidence is strictly greater; ties keep the incumbent.
//!
//! ```text
//! candidate ──▶ staged this run? ──yes──▶ conf > staged?  ──▶ replace staged / discard
//!                    │no
//!                    ▼
//!               stored?  ──yes──▶ conf > stored?  ──▶ to_update / discard
//!                    │no
//!                    ▼
//!                to_insert
//! ```

use std::collections::HashMap;

use crate::models::{Fact, FactCandidate};

/// Returns `true` when a candidate has a non-empty key and value and a
/// finite confidence within `[0, 1]`.
pub fn validate_fact(fact: &FactCandidate) -> bool {
    !fact.key.trim().is_empty()
        && !fact.value.trim().is_empty()
        && fact.confidence.is_finite()
        && (0.0..=1.0).contains(&fact.confidence)
}

/// Outcome of reconciling one batch of candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Keys the brain does not know yet.
    pub to_insert: Vec<FactCandidate>,
    /// Keys whose stored fact is beaten by a more confident candidate.
    pub to_update: Vec<FactCandidate>,
    /// Candidates that were invalid or did not beat the incumbent.
    pub discarded: usize,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Staged {
    Insert(usize),
    Update(usize),
}

/// Decide insert, update, or discard for each candidate.
///
/// `existing` holds the facts stored for the brain (one per key). The output
/// contains at most one entry per key across `to_insert` and `to_update`,
/// ordered by the first time the key was staged.
pub fn reconcile(new_facts: &[FactCandidate], existing: &[Fact]) -> Reconciliation {
    let stored: HashMap<&str, f64> = existing
        .iter()
        .map(|f| (f.key.as_str(), f.confidence))
        .collect();

    let mut out = Reconciliation::default();
    let mut staged: HashMap<String, Staged> = HashMap::new();

    for candidate in new_facts {
        if !validate_fact(candidate) {
            out.discarded += 1;
            continue;
        }

        if let Some(slot) = staged.get(&candidate.key).copied() {
            let current = match slot {
                Staged::Insert(i) => &mut out.to_insert[i],
                Staged::Update(i) => &mut out.to_update[i],
            };
            if candidate.confidence > current.confidence {
                *current = candidate.clone();
            }
            // The loser (either the replaced staged fact or this candidate) is dropped.
            out.discarded += 1;
            continue;
        }

        match stored.get(candidate.key.as_str()) {
            Some(&stored_confidence) if candidate.confidence > stored_confidence => {
                staged.insert(candidate.key.clone(), Staged::Update(out.to_update.len()));
                out.to_update.push(candidate.clone());
            }
            Some(_) => out.discarded += 1,
            None => {
                staged.insert(candidate.key.clone(), Staged::Insert(out.to_insert.len()));
                out.to_insert.push(candidate.clone());
            }
        }
    }

    out
}
