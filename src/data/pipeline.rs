// ============================================================
// Layer 4 — Preprocessing Pipeline
// ============================================================
// Turns raw QA examples into id sequences the model can batch.
//
//   RawCorpus (text)
//       │  normalize     → casing canonicalisation
//       │  tokenize      → question / support into tokens
//       │  map           → tokens to ids through the VocabSet
//       │  cache         → identical candidate lists mapped once
//       │  map_to_target → answer position within its candidates
//       │  negsamples    → answer + k sampled distractors
//       ▼
//   Corpus (ids)
//
// Growth rule: ids are only added when `test_time` is false AND
// the vocabulary is an owned, unfrozen Vocab. Shared resources
// are passed as &Vocab, which cannot grow at all.
//
// Every field of the corpus is a parallel Vec: index i in each
// field belongs to example i.

use std::collections::HashMap;

use rand::Rng;

use crate::data::preprocessor::Preprocessor;
use crate::data::sampler::{dynamic_subsample, NegativeSource};
use crate::data::vocab::{VocabLookup, VocabSet};
use crate::domain::error::{ReaderError, Result};
use crate::domain::qa_setting::{QaExample, QaSetting};
use crate::domain::traits::Tokenize;

// ─── RawCorpus ────────────────────────────────────────────────────────────────
/// Parallel text fields, one entry per example.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCorpus {
    pub ids:        Vec<usize>,
    pub question:   Vec<String>,
    pub support:    Vec<Vec<String>>,
    pub candidates: Vec<Vec<String>>,
    /// Absent at test time
    pub answers:    Option<Vec<String>>,
}

impl RawCorpus {
    /// Labelled corpus. Each example contributes its first gold answer;
    /// an example without any answer is a precondition violation.
    pub fn from_examples(examples: &[QaExample], single_support: bool) -> Result<Self> {
        let mut corpus = Self::from_settings(
            examples.iter().map(|e| &e.setting),
            single_support,
        );
        let mut answers = Vec::with_capacity(examples.len());
        for (i, ex) in examples.iter().enumerate() {
            match ex.answers.first() {
                Some(a) => {
                    if ex.answers.len() > 1 {
                        tracing::debug!("example {} has {} answers, using the first", i, ex.answers.len());
                    }
                    answers.push(a.text.clone());
                }
                None => {
                    return Err(ReaderError::MissingAnswer { example: i, answer: String::new() });
                }
            }
        }
        corpus.answers = Some(answers);
        Ok(corpus)
    }

    /// Unlabelled (test-time) corpus
    pub fn from_settings<'a>(
        settings:       impl IntoIterator<Item = &'a QaSetting>,
        single_support: bool,
    ) -> Self {
        let mut corpus = Self {
            ids:        Vec::new(),
            question:   Vec::new(),
            support:    Vec::new(),
            candidates: Vec::new(),
            answers:    None,
        };
        for (i, s) in settings.into_iter().enumerate() {
            corpus.ids.push(i);
            corpus.question.push(s.question.clone());
            let support = if single_support {
                s.support.iter().take(1).cloned().collect()
            } else {
                s.support.clone()
            };
            corpus.support.push(support);
            corpus.candidates.push(s.atomic_candidates.clone());
        }
        corpus
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ─── Corpus ───────────────────────────────────────────────────────────────────
/// Parallel id fields, one entry per example.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub ids:              Vec<usize>,
    pub question:         Vec<Vec<u32>>,
    pub support:          Vec<Vec<Vec<u32>>>,
    pub candidates:       Vec<Vec<u32>>,
    /// Answer ids (target vocabulary); absent at test time
    pub answers:          Option<Vec<u32>>,
    /// Position of the answer in `candidates[i]`; absent at test time
    pub targets:          Option<Vec<usize>>,
    pub question_lengths: Vec<usize>,
    pub support_lengths:  Vec<Vec<usize>>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// All present fields must have one entry per example
    pub fn check_lengths(&self) -> Result<()> {
        let n = self.ids.len();
        let mut fields = vec![
            ("question", self.question.len()),
            ("support", self.support.len()),
            ("candidates", self.candidates.len()),
            ("question_lengths", self.question_lengths.len()),
            ("support_lengths", self.support_lengths.len()),
        ];
        if let Some(a) = &self.answers {
            fields.push(("answers", a.len()));
        }
        if let Some(t) = &self.targets {
            fields.push(("targets", t.len()));
        }
        for (name, len) in fields {
            if len != n {
                return Err(ReaderError::shape(format!(
                    "corpus field '{}' has {} entries, expected {}", name, len, n
                )));
            }
        }
        Ok(())
    }
}

// ─── Options ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineOptions {
    /// No answers, no vocabulary growth, no sampling
    pub test_time:       bool,
    /// Split question/support into tokens; otherwise each text is one token
    pub tokenization:    bool,
    /// Map each distinct candidate list only once
    pub cache_fun:       bool,
    /// Record the answer's position within its candidate list
    pub map_to_target:   bool,
    /// Lowercase and clean every text field
    pub normalize:       bool,
    /// Dynamic negative sampling: answer + k negatives (training only)
    pub negsamples:      Option<usize>,
    pub negative_source: NegativeSource,
    /// Keep only the first support passage
    pub single_support:  bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            test_time:       false,
            tokenization:    true,
            cache_fun:       true,
            map_to_target:   true,
            normalize:       true,
            negsamples:      None,
            negative_source: NegativeSource::Candidates,
            single_support:  true,
        }
    }
}

// ─── pipeline ─────────────────────────────────────────────────────────────────
/// Run the full preprocessing pipeline and hand the vocabularies back.
pub fn pipeline<V, R>(
    raw:       RawCorpus,
    mut vocabs: VocabSet<V>,
    opts:      &PipelineOptions,
    tokenizer: &dyn Tokenize,
    rng:       &mut R,
) -> Result<(Corpus, VocabSet<V>)>
where
    V: VocabLookup,
    R: Rng + ?Sized,
{
    let n = raw.len();
    if raw.question.len() != n || raw.support.len() != n || raw.candidates.len() != n {
        return Err(ReaderError::shape("raw corpus fields differ in length"));
    }
    let grow = !opts.test_time;

    // ── Normalisation ─────────────────────────────────────────────────────────
    let prep = Preprocessor::new(true);
    let norm = |s: &str| if opts.normalize { prep.normalize(s) } else { s.to_string() };

    let candidate_text: Vec<Vec<String>> = raw
        .candidates
        .iter()
        .map(|cs| cs.iter().map(|c| norm(c.as_str())).collect())
        .collect();
    let answer_text: Option<Vec<String>> = if opts.test_time {
        None
    } else {
        raw.answers.as_ref().map(|a| a.iter().map(|s| norm(s.as_str())).collect())
    };

    // ── Tokenisation ──────────────────────────────────────────────────────────
    let split = |s: &str| -> Vec<String> {
        let s = norm(s);
        if opts.tokenization {
            tokenizer.tokenize(&s)
        } else {
            vec![s]
        }
    };

    // ── Vocabulary mapping: question + support ────────────────────────────────
    let mut question         = Vec::with_capacity(n);
    let mut question_lengths = Vec::with_capacity(n);
    let mut support          = Vec::with_capacity(n);
    let mut support_lengths  = Vec::with_capacity(n);

    for i in 0..n {
        let q: Vec<u32> = split(raw.question[i].as_str())
            .iter()
            .map(|t| vocabs.main_mut().id_of(t, grow))
            .collect();
        question_lengths.push(q.len());
        question.push(q);

        let passages: Vec<Vec<u32>> = raw.support[i]
            .iter()
            .map(|p| split(p.as_str()).iter().map(|t| vocabs.main_mut().id_of(t, grow)).collect())
            .collect();
        support_lengths.push(passages.iter().map(Vec::len).collect());
        support.push(passages);
    }

    // ── Answers through the target vocabulary ─────────────────────────────────
    let answers: Option<Vec<u32>> = answer_text.as_ref().map(|texts| {
        texts.iter().map(|a| vocabs.target_mut().id_of(a, grow)).collect()
    });

    // ── Candidates through the candidate vocabulary (cached) ──────────────────
    let mut cache: HashMap<&[String], Vec<u32>> = HashMap::new();
    let mut candidates = Vec::with_capacity(n);
    for cs in &candidate_text {
        let cached = if opts.cache_fun { cache.get(cs.as_slice()).cloned() } else { None };
        let mapped = match cached {
            Some(hit) => hit,
            None => {
                let ids: Vec<u32> = cs.iter().map(|c| vocabs.map_candidate(c, grow)).collect();
                if opts.cache_fun {
                    cache.insert(cs.as_slice(), ids.clone());
                }
                ids
            }
        };
        candidates.push(mapped);
    }

    // ── Target positions ──────────────────────────────────────────────────────
    let needs_targets = opts.map_to_target || opts.negsamples.is_some();
    let mut targets: Option<Vec<usize>> = match (&answer_text, needs_targets) {
        (Some(texts), true) => {
            let mut t = Vec::with_capacity(n);
            for (i, answer) in texts.iter().enumerate() {
                let pos = candidate_text[i]
                    .iter()
                    .position(|c| c == answer)
                    .ok_or_else(|| ReaderError::MissingAnswer {
                        example: raw.ids[i],
                        answer:  answer.clone(),
                    })?;
                t.push(pos);
            }
            Some(t)
        }
        _ => None,
    };

    // ── Dynamic negative sampling ─────────────────────────────────────────────
    if let (Some(k), Some(t), false) = (opts.negsamples, targets.as_mut(), opts.test_time) {
        for i in 0..n {
            let (sampled, new_target) = dynamic_subsample(
                &candidates[i], t[i], k, opts.negative_source, &vocabs.candidate_ids, rng,
            );
            if sampled.is_empty() {
                return Err(ReaderError::shape(format!(
                    "example {} has no candidates after sampling", raw.ids[i]
                )));
            }
            candidates[i] = sampled;
            t[i] = new_target;
        }
    }

    let corpus = Corpus {
        ids: raw.ids,
        question,
        support,
        candidates,
        answers,
        targets: if opts.map_to_target { targets } else { None },
        question_lengths,
        support_lengths,
    };
    corpus.check_lengths()?;

    tracing::debug!(
        "Preprocessed {} examples (test_time={}, negsamples={:?}, vocab size {})",
        corpus.len(),
        opts.test_time,
        opts.negsamples,
        vocabs.vocab.vocab().len(),
    );

    Ok((corpus, vocabs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::WhitespaceTokenizer;
    use crate::data::vocab::{Vocab, UNK_ID};
    use crate::domain::qa_setting::Answer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn example(q: &str, cands: &[&str], answer: &str) -> QaExample {
        QaExample::new(
            QaSetting::new(q, vec!["some support text".into()], cands.iter().map(|c| c.to_string()).collect()),
            vec![Answer::new(answer)],
        )
    }

    fn data() -> Vec<QaExample> {
        vec![
            example("capital of France", &["Paris", "Lyon", "Berlin"], "Paris"),
            example("capital of Germany", &["Paris", "Lyon", "Berlin"], "Berlin"),
            example("largest city of France", &["Paris", "Marseille"], "Paris"),
        ]
    }

    fn run(examples: &[QaExample], opts: &PipelineOptions) -> (Corpus, VocabSet<Vocab>) {
        let raw = RawCorpus::from_examples(examples, true).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        pipeline(raw, VocabSet::growing(false), opts, &WhitespaceTokenizer, &mut rng).unwrap()
    }

    #[test]
    fn test_every_training_token_gets_an_id() {
        let (_, vocabs) = run(&data(), &PipelineOptions::default());
        for tok in ["capital", "of", "france", "germany", "paris", "marseille", "some"] {
            assert!(vocabs.vocab.contains(tok), "missing {tok}");
        }
    }

    #[test]
    fn test_test_time_never_grows() {
        let (_, vocabs) = run(&data(), &PipelineOptions::default());
        let before = vocabs.vocab.len();

        let unseen = vec![QaSetting::new("capital of Spain", vec![], vec!["Madrid".into()])];
        let raw = RawCorpus::from_settings(&unseen, true);
        let opts = PipelineOptions { test_time: true, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(0);
        let (corpus, vocabs) =
            pipeline(raw, vocabs, &opts, &WhitespaceTokenizer, &mut rng).unwrap();

        assert_eq!(vocabs.vocab.len(), before);
        assert_eq!(corpus.candidates[0], vec![UNK_ID]);
        assert_eq!(*corpus.question[0].last().unwrap(), UNK_ID);
    }

    #[test]
    fn test_field_lengths_match() {
        let (corpus, _) = run(&data(), &PipelineOptions::default());
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.question.len(), 3);
        assert_eq!(corpus.candidates.len(), 3);
        assert_eq!(corpus.answers.as_ref().unwrap().len(), 3);
        assert!(corpus.check_lengths().is_ok());

        let raw = RawCorpus::from_settings(data().iter().map(|e| &e.setting), true);
        let opts = PipelineOptions { test_time: true, ..Default::default() };
        let mut rng = StdRng::seed_from_u64(0);
        let (corpus, _) =
            pipeline(raw, VocabSet::growing(false), &opts, &WhitespaceTokenizer, &mut rng).unwrap();
        assert_eq!(corpus.question.len(), 3);
        assert!(corpus.answers.is_none());
        assert!(corpus.targets.is_none());
    }

    #[test]
    fn test_negative_sampling_keeps_answer() {
        for k in 0..4 {
            let opts = PipelineOptions { negsamples: Some(k), ..Default::default() };
            let (corpus, _) = run(&data(), &opts);
            let answers = corpus.answers.as_ref().unwrap();
            let targets = corpus.targets.as_ref().unwrap();
            for i in 0..corpus.len() {
                assert_eq!(corpus.candidates[i][targets[i]], answers[i]);
                assert!(corpus.candidates[i].len() <= k + 1);
            }
        }
    }

    #[test]
    fn test_vocabulary_negatives_are_known_candidates() {
        // shared id space: question and support tokens live in the same vocabulary
        let (_, vocabs) = run(&data(), &PipelineOptions::default());
        let known: Vec<u32> = ["paris", "lyon", "berlin", "marseille"]
            .iter()
            .map(|c| vocabs.vocab.lookup(c))
            .collect();
        assert_eq!(vocabs.candidate_ids.len(), 4);

        let opts = PipelineOptions {
            negsamples: Some(10),
            negative_source: NegativeSource::Vocabulary,
            ..Default::default()
        };
        for seed in 0..5 {
            let raw = RawCorpus::from_examples(&data(), true).unwrap();
            let mut rng = StdRng::seed_from_u64(seed);
            let (corpus, _) =
                pipeline(raw, vocabs.clone(), &opts, &WhitespaceTokenizer, &mut rng).unwrap();
            for cands in &corpus.candidates {
                assert_eq!(cands.len(), 4);
                assert!(cands.iter().all(|id| known.contains(id)), "{cands:?} has a non-candidate");
            }
        }
    }

    #[test]
    fn test_support_is_mapped_with_lengths() {
        let (corpus, vocabs) = run(&data(), &PipelineOptions::default());
        assert_eq!(corpus.support_lengths, vec![vec![3], vec![3], vec![3]]);
        assert_eq!(corpus.support[0][0][0], vocabs.vocab.lookup("some"));
        assert_eq!(corpus.question_lengths, vec![3, 3, 4]);
    }

    #[test]
    fn test_cache_is_transparent() {
        let cached   = run(&data(), &PipelineOptions { cache_fun: true, ..Default::default() });
        let uncached = run(&data(), &PipelineOptions { cache_fun: false, ..Default::default() });
        assert_eq!(cached.0, uncached.0);
        assert_eq!(cached.1.vocab, uncached.1.vocab);
    }

    #[test]
    fn test_missing_answer_is_an_error() {
        let bad = vec![example("q", &["a", "b"], "c")];
        let raw = RawCorpus::from_examples(&bad, true).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let err = pipeline(raw, VocabSet::growing(false), &PipelineOptions::default(), &WhitespaceTokenizer, &mut rng)
            .unwrap_err();
        assert!(matches!(err, ReaderError::MissingAnswer { example: 0, .. }));
    }

    #[test]
    fn test_notokenize_keeps_question_atomic() {
        let opts = PipelineOptions { tokenization: false, ..Default::default() };
        let (corpus, vocabs) = run(&data(), &opts);
        assert_eq!(corpus.question[0].len(), 1);
        assert!(vocabs.vocab.contains("capital of france"));
    }

    #[test]
    fn test_sepvocab_keeps_id_spaces_apart() {
        let raw = RawCorpus::from_examples(&data(), true).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let (_, vocabs) = pipeline(
            raw, VocabSet::growing(true), &PipelineOptions::default(), &WhitespaceTokenizer, &mut rng,
        ).unwrap();
        assert!(!vocabs.vocab.contains("marseille"));
        assert!(vocabs.candidate.as_ref().unwrap().contains("marseille"));
        assert!(vocabs.target.as_ref().unwrap().contains("berlin"));
    }
}
