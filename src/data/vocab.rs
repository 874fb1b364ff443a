// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Bidirectional token ↔ id mapping.
//
// Two modes:
//   growing — unseen tokens are appended with the next free id
//   frozen  — unseen tokens map to UNK_ID, never an error
//
// Special ids:
//   0  <PAD>  — padding, never assigned to a real token
//   1  <UNK>  — anything the frozen vocabulary has not seen
//
// Ids are handed out in first-seen order, so the same corpus
// visited in the same order always yields the same mapping.
//
// Reference: Rust Book §8 (HashMap)

use std::collections::{BTreeSet, HashMap};
use serde::{Deserialize, Serialize};

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const PAD_TOKEN: &str = "<PAD>";
pub const UNK_TOKEN: &str = "<UNK>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocab {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    frozen:      bool,
}

impl Vocab {
    /// An empty, growing vocabulary holding only the special tokens
    pub fn new() -> Self {
        let mut vocab = Self {
            token_to_id: HashMap::new(),
            id_to_token: Vec::new(),
            frozen:      false,
        };
        vocab.insert(PAD_TOKEN);
        vocab.insert(UNK_TOKEN);
        vocab
    }

    fn insert(&mut self, token: &str) -> u32 {
        let id = self.id_to_token.len() as u32;
        self.token_to_id.insert(token.to_string(), id);
        self.id_to_token.push(token.to_string());
        id
    }

    /// Map a token, growing the vocabulary if allowed.
    /// `grow = false` or a frozen vocabulary falls back to lookup.
    pub fn map(&mut self, token: &str, grow: bool) -> u32 {
        if let Some(&id) = self.token_to_id.get(token) {
            return id;
        }
        if grow && !self.frozen {
            self.insert(token)
        } else {
            UNK_ID
        }
    }

    /// Read-only mapping: unseen tokens become UNK_ID
    pub fn lookup(&self, token: &str) -> u32 {
        self.token_to_id.get(token).copied().unwrap_or(UNK_ID)
    }

    /// Reverse mapping, used to decode ids in logs and tests
    pub fn get_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(|s| s.as_str())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Stop growing. There is no way back: a frozen vocabulary
    /// stays frozen for the lifetime of the reader that owns it.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// True once `freeze` has been called
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Total number of ids, special tokens included
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    /// True when only the special tokens are present
    pub fn is_empty(&self) -> bool {
        self.id_to_token.len() <= 2
    }
}

impl Default for Vocab {
    fn default() -> Self {
        Self::new()
    }
}

// ─── VocabLookup ──────────────────────────────────────────────────────────────
/// What the preprocessing pipeline needs from a vocabulary.
///
/// An owned `Vocab` may grow; a borrowed `&Vocab` never does, so
/// passing shared resources by reference makes them frozen by type.
pub trait VocabLookup {
    fn id_of(&mut self, token: &str, grow: bool) -> u32;

    fn vocab(&self) -> &Vocab;
}

impl VocabLookup for Vocab {
    fn id_of(&mut self, token: &str, grow: bool) -> u32 {
        self.map(token, grow)
    }

    fn vocab(&self) -> &Vocab {
        self
    }
}

impl VocabLookup for &Vocab {
    fn id_of(&mut self, token: &str, _grow: bool) -> u32 {
        self.lookup(token)
    }

    fn vocab(&self) -> &Vocab {
        self
    }
}

// ─── VocabSet ─────────────────────────────────────────────────────────────────
/// The three vocabularies the pipeline maps through.
///
/// `target` and `candidate` set to `None` means they share the
/// main vocabulary's id space (no separate vocabularies).
///
/// `candidate_ids` remembers which ids were ever mapped as a
/// candidate. In the shared case the candidate vocabulary also
/// holds question and support tokens, so vocabulary-sourced
/// negatives are drawn from this set instead.
#[derive(Debug, Clone)]
pub struct VocabSet<V> {
    pub vocab:         V,
    pub target:        Option<V>,
    pub candidate:     Option<V>,
    pub candidate_ids: BTreeSet<u32>,
}

impl<V: VocabLookup> VocabSet<V> {
    /// Questions, candidates and answers all map through `vocab`
    pub fn shared(vocab: V) -> Self {
        Self { vocab, target: None, candidate: None, candidate_ids: BTreeSet::new() }
    }

    /// Distinct id spaces for answers and candidates, so a candidate
    /// id can never collide with a question token id
    pub fn separate(vocab: V, target: V, candidate: V) -> Self {
        Self { vocab, target: Some(target), candidate: Some(candidate), candidate_ids: BTreeSet::new() }
    }

    /// Seed the candidate-id pool, e.g. from saved resources
    pub fn with_candidate_ids(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.candidate_ids.extend(ids);
        self
    }

    pub fn is_separate(&self) -> bool {
        self.target.is_some() || self.candidate.is_some()
    }

    pub fn main_mut(&mut self) -> &mut V {
        &mut self.vocab
    }

    pub fn target_mut(&mut self) -> &mut V {
        match self.target.as_mut() {
            Some(t) => t,
            None    => &mut self.vocab,
        }
    }

    pub fn candidate_mut(&mut self) -> &mut V {
        match self.candidate.as_mut() {
            Some(c) => c,
            None    => &mut self.vocab,
        }
    }

    /// Map a candidate and remember its id when growing.
    /// Special ids never enter the pool.
    pub fn map_candidate(&mut self, token: &str, grow: bool) -> u32 {
        let id = self.candidate_mut().id_of(token, grow);
        if grow && id > UNK_ID {
            self.candidate_ids.insert(id);
        }
        id
    }
}

impl VocabSet<Vocab> {
    /// Fresh growing vocabularies, separate or shared
    pub fn growing(sepvocab: bool) -> Self {
        if sepvocab {
            Self::separate(Vocab::new(), Vocab::new(), Vocab::new())
        } else {
            Self::shared(Vocab::new())
        }
    }

    /// Freeze everything, cloning the main vocabulary into the
    /// shared slots.
    pub fn into_frozen(self) -> FrozenVocabs {
        let mut vocab = self.vocab;
        vocab.freeze();
        let mut target    = self.target.unwrap_or_else(|| vocab.clone());
        let mut candidate = self.candidate.unwrap_or_else(|| vocab.clone());
        target.freeze();
        candidate.freeze();
        FrozenVocabs {
            vocab,
            target,
            candidate,
            candidate_ids: self.candidate_ids.into_iter().collect(),
        }
    }
}

/// Output of setup: three frozen vocabularies plus the sorted ids
/// that appeared as candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenVocabs {
    pub vocab:         Vocab,
    pub target:        Vocab,
    pub candidate:     Vocab,
    pub candidate_ids: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut v = Vocab::new();
        assert_eq!(v.map("b", true), 2);
        assert_eq!(v.map("a", true), 3);
        assert_eq!(v.map("b", true), 2);
        assert_eq!(v.get_token(3), Some("a"));
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_frozen_maps_unseen_to_unk() {
        let mut v = Vocab::new();
        v.map("known", true);
        v.freeze();
        assert_eq!(v.map("unseen", true), UNK_ID);
        assert_eq!(v.len(), 3);
        assert!(!v.contains("unseen"));
    }

    #[test]
    fn test_no_grow_flag_does_not_grow() {
        let mut v = Vocab::new();
        assert_eq!(v.map("x", false), UNK_ID);
        assert!(v.is_empty());
    }

    #[test]
    fn test_borrowed_lookup_never_grows() {
        let v = Vocab::new();
        let mut borrowed = &v;
        assert_eq!(borrowed.id_of("x", true), UNK_ID);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_shared_set_routes_to_main() {
        let mut set = VocabSet::growing(false);
        let a = set.map_candidate("paris", true);
        let b = set.main_mut().map("paris", true);
        assert_eq!(a, b);
        let frozen = set.into_frozen();
        assert!(frozen.vocab.is_frozen() && frozen.target.is_frozen() && frozen.candidate.is_frozen());
        assert_eq!(frozen.candidate.lookup("paris"), a);
    }

    #[test]
    fn test_candidate_ids_exclude_other_tokens() {
        let mut set = VocabSet::growing(false);
        set.main_mut().map("capital", true);
        let paris = set.map_candidate("paris", true);
        set.map_candidate("paris", true);
        let frozen_lookup = set.map_candidate("unseen", false);
        assert_eq!(frozen_lookup, UNK_ID);

        let frozen = set.into_frozen();
        assert_eq!(frozen.candidate_ids, vec![paris]);
        assert!(frozen.candidate.contains("capital"));
    }

    #[test]
    fn test_freeze_is_permanent() {
        let mut v = Vocab::new();
        v.freeze();
        v.freeze();
        assert!(v.is_frozen());
        assert_eq!(v.map("late", true), UNK_ID);
    }

    #[test]
    fn test_separate_sets_have_own_ids() {
        let mut set = VocabSet::growing(true);
        set.main_mut().map("q", true);
        let c = set.map_candidate("paris", true);
        assert_eq!(c, 2);
        assert!(set.candidate_ids.contains(&2));
        assert!(!set.vocab.contains("paris"));
    }
}
