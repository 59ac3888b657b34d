//! Corpus-relative TF-IDF vector space.
//!
//! A [`VectorSpace`] is derived from exactly one corpus snapshot. Its
//! dimensions are the corpus vocabulary in lexicographic order, weighted
//! by inverse document frequency. Rebuilding over a different corpus shifts
//! both the dimension order and the weights, so vectors produced by two
//! spaces are not comparable.
//!
//! Neither the dimensions nor the weights depend on document order, so
//! [`VectorSpace::fingerprint`] identifies the corpus as a multiset: the
//! same fragments read back in any order map to the same space.
//!
//! # Example
//!
//! ```rust
//! use quackstack_core::vector_space::VectorSpace;
//!
//! let space = VectorSpace::build(["function parse tokens", "render widget tree"]);
//! assert_eq!(space.dims(), 6);
//! assert_eq!(space.vectorize("parse").len(), 6);
//! ```

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

/// Split text into lowercase terms.
///
/// Every character outside `[a-z0-9_]` (after lowercasing) acts as a
/// separator, and tokens of two characters or fewer are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

/// Order-insensitive SHA-256 over the corpus as a multiset of documents.
///
/// Each document is hashed on its own, the digests are sorted, and the
/// fingerprint is the hash of the sorted digests plus the document count.
/// Two corpora with the same documents in any order share a fingerprint.
pub fn corpus_fingerprint<I, S>(corpus: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let digests = corpus.into_iter().map(|doc| document_digest(doc.as_ref())).collect();
    combine_digests(digests)
}

fn document_digest(doc: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((doc.len() as u64).to_le_bytes());
    hasher.update(doc.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

fn combine_digests(mut digests: Vec<[u8; 32]>) -> String {
    digests.sort_unstable();
    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest);
    }
    hasher.update((digests.len() as u64).to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// A vocabulary with IDF weights, built from one corpus snapshot.
#[derive(Debug, Clone)]
pub struct VectorSpace {
    terms: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
    document_count: usize,
    fingerprint: String,
}

impl VectorSpace {
    /// Build the vocabulary from scratch over `corpus`.
    ///
    /// `idf[t] = ln(N / df[t])`, where `df[t]` counts the documents that
    /// contain `t` at least once. A term present in every document gets 0.
    pub fn build<I, S>(corpus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut digests: Vec<[u8; 32]> = Vec::new();
        let mut doc_freq: HashMap<String, u64> = HashMap::new();

        for doc in corpus {
            let doc = doc.as_ref();
            digests.push(document_digest(doc));

            let unique: HashSet<String> = tokenize(doc).into_iter().collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }
        let document_count = digests.len();

        let mut terms: Vec<String> = doc_freq.keys().cloned().collect();
        terms.sort_unstable();
        let index: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        let n = document_count as f64;
        let idf = terms
            .iter()
            .map(|term| (n / doc_freq[term] as f64).ln())
            .collect();

        Self {
            terms,
            index,
            idf,
            document_count,
            fingerprint: combine_digests(digests),
        }
    }

    /// Project `text` into this space.
    ///
    /// Each coordinate is `count(term) / total_tokens × idf(term)`. Tokens
    /// outside the vocabulary still count toward `total_tokens` but add no
    /// coordinate. The result always has [`dims`](Self::dims) entries.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.terms.len()];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        let mut counts: HashMap<usize, u32> = HashMap::new();
        for token in &tokens {
            if let Some(&i) = self.index.get(token) {
                *counts.entry(i).or_insert(0) += 1;
            }
        }

        let total = tokens.len() as f64;
        for (i, count) in counts {
            vector[i] = (count as f64 / total * self.idf[i]) as f32;
        }
        vector
    }

    /// IDF weight for `term`, or `None` when it never occurred.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.index.get(term).map(|&i| self.idf[i])
    }

    /// Vocabulary size, which is also the vector dimensionality.
    pub fn dims(&self) -> usize {
        self.terms.len()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// Vocabulary terms in dimension order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Fingerprint of the corpus this space was built from; equal to
    /// [`corpus_fingerprint`] over the same documents in the same order.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether this space was built from exactly `corpus`.
    pub fn matches<I, S>(&self, corpus: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        corpus_fingerprint(corpus) == self.fingerprint
    }
}
