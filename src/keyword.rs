//! Sparse keyword index (BM25 Okapi).
//!
//! The index is built once from the full unit list and persisted as a single
//! JSON document with an explicit schema version. Each entry carries the unit
//! itself plus its term frequencies, so the file can be inspected or consumed
//! outside this crate. Corpus statistics (document frequencies, average
//! length, IDF) are derived again on load.
//!
//! # Scoring
//!
//! ```text
//! idf(t)      = ln((N - n(t) + 0.5) / (n(t) + 0.5))
//!               (negative values are replaced by ε × mean idf)
//! score(q, d) = Σ idf(t) × tf(t,d) × (k1 + 1) / (tf(t,d) + k1 × (1 - b + b × |d| / avgdl))
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{best_first, LegalUnit};

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

pub const DEFAULT_K1: f64 = 1.5;
pub const DEFAULT_B: f64 = 0.75;
pub const DEFAULT_EPSILON: f64 = 0.25;

#[derive(Debug, Error)]
pub enum KeywordIndexError {
    #[error("keyword index not found at {0} (run `luat build` first)")]
    NotFound(String),
    #[error("failed to read keyword index: {0}")]
    Io(#[from] std::io::Error),
    #[error("keyword index is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
    #[error("unsupported keyword index schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },
}

/// One indexed unit with its bag-of-words statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub unit: LegalUnit,
    /// Token count of the unit content.
    pub length: u32,
    pub term_freqs: BTreeMap<String, u32>,
}

/// Serialized form of the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordIndexFile {
    pub schema_version: u32,
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
    pub entries: Vec<KeywordEntry>,
}

/// In-memory BM25 index over legal units.
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    k1: f64,
    b: f64,
    epsilon: f64,
    entries: Vec<KeywordEntry>,
    idf: HashMap<String, f64>,
    avg_len: f64,
}

/// Split text into lowercase word tokens. Vietnamese letters with diacritics
/// count as alphanumeric, so syllables survive intact.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

impl KeywordIndex {
    /// Build an index with the default BM25 parameters.
    pub fn build(units: &[LegalUnit]) -> Self {
        Self::build_with_params(units, DEFAULT_K1, DEFAULT_B, DEFAULT_EPSILON)
    }

    pub fn build_with_params(units: &[LegalUnit], k1: f64, b: f64, epsilon: f64) -> Self {
        let entries = units
            .iter()
            .map(|unit| {
                let tokens = tokenize(&unit.content);
                let mut term_freqs = BTreeMap::new();
                for t in &tokens {
                    *term_freqs.entry(t.clone()).or_insert(0u32) += 1;
                }
                KeywordEntry {
                    unit: unit.clone(),
                    length: tokens.len() as u32,
                    term_freqs,
                }
            })
            .collect();
        Self::from_entries(entries, k1, b, epsilon)
    }

    fn from_entries(entries: Vec<KeywordEntry>, k1: f64, b: f64, epsilon: f64) -> Self {
        let n = entries.len() as f64;
        let avg_len = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.length as f64).sum::<f64>() / n
        };

        let mut doc_freq: HashMap<&str, u32> = HashMap::new();
        for e in &entries {
            for term in e.term_freqs.keys() {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in &doc_freq {
            let df = *df as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.to_string());
            }
            idf.insert(term.to_string(), value);
        }
        // Terms present in more than half the corpus get a small positive floor.
        if !idf.is_empty() {
            let floor = epsilon * idf_sum / idf.len() as f64;
            for term in negative {
                idf.insert(term, floor);
            }
        }

        Self {
            k1,
            b,
            epsilon,
            entries,
            idf,
            avg_len,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// BM25 score of every entry against the query, in entry order.
    pub fn scores(&self, query: &str) -> Vec<f64> {
        let terms = tokenize(query);
        self.entries
            .iter()
            .map(|e| {
                let norm = if self.avg_len > 0.0 {
                    1.0 - self.b + self.b * e.length as f64 / self.avg_len
                } else {
                    1.0
                };
                terms
                    .iter()
                    .map(|t| {
                        let tf = e.term_freqs.get(t).copied().unwrap_or(0) as f64;
                        if tf == 0.0 {
                            return 0.0;
                        }
                        let idf = self.idf.get(t).copied().unwrap_or(0.0);
                        idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm)
                    })
                    .sum()
            })
            .collect()
    }

    /// Return up to `k` units ranked by BM25 score, best first.
    ///
    /// Like the reference BM25 retriever, the top `k` are returned even when
    /// their score is zero, as long as the index is non-empty. Ties keep
    /// index order.
    pub fn search(&self, query: &str, k: usize) -> Vec<(LegalUnit, f64)> {
        let scores = self.scores(query);
        let mut ranked: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| best_first(a.1, b.1));
        ranked.truncate(k);
        ranked
            .into_iter()
            .map(|(i, s)| (self.entries[i].unit.clone(), s))
            .collect()
    }

    pub fn to_file(&self) -> KeywordIndexFile {
        KeywordIndexFile {
            schema_version: SCHEMA_VERSION,
            k1: self.k1,
            b: self.b,
            epsilon: self.epsilon,
            entries: self.entries.clone(),
        }
    }

    pub fn from_file(file: KeywordIndexFile) -> Result<Self, KeywordIndexError> {
        if file.schema_version != SCHEMA_VERSION {
            return Err(KeywordIndexError::SchemaVersion {
                found: file.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(Self::from_entries(file.entries, file.k1, file.b, file.epsilon))
    }

    /// Write the index to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> Result<(), KeywordIndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(&self.to_file())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load an index written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, KeywordIndexError> {
        if !path.exists() {
            return Err(KeywordIndexError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let file: KeywordIndexFile = serde_json::from_slice(&bytes)?;
        Self::from_file(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocType, UnitMetadata};

    fn unit(citation: &str, content: &str) -> LegalUnit {
        LegalUnit {
            content: content.to_string(),
            metadata: UnitMetadata {
                doc_type: DocType::Decree,
                law_name: "168/2024/NĐ-CP".to_string(),
                law_id: "168_2024_ND-CP".to_string(),
                article: "6".to_string(),
                clause: "1".to_string(),
                point: "all".to_string(),
                citation: citation.to_string(),
                is_parent: true,
            },
        }
    }

    fn corpus() -> Vec<LegalUnit> {
        vec![
            unit("A", "Không chấp hành hiệu lệnh của đèn tín hiệu giao thông"),
            unit("B", "Không đội mũ bảo hiểm khi điều khiển xe mô tô"),
            unit("C", "Dừng xe, đỗ xe không đúng quy định"),
            unit("D", "Điều khiển xe chạy quá tốc độ quy định"),
        ]
    }

    #[test]
    fn tokenize_keeps_vietnamese_syllables() {
        assert_eq!(
            tokenize("Điều 6. Phạt tiền: 800.000 đồng!"),
            vec!["điều", "6", "phạt", "tiền", "800", "000", "đồng"]
        );
    }

    #[test]
    fn ranks_matching_unit_first() {
        let index = KeywordIndex::build(&corpus());
        let results = index.search("đèn tín hiệu", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.citation(), "A");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn search_respects_k() {
        let index = KeywordIndex::build(&corpus());
        assert_eq!(index.search("xe", 3).len(), 3);
        assert_eq!(index.search("xe", 10).len(), 4);
    }

    #[test]
    fn common_terms_get_positive_floor() {
        // "xe" appears in 3 of 4 units, so its raw idf is negative.
        let index = KeywordIndex::build(&corpus());
        let scores = index.scores("xe");
        assert!(scores[1] > 0.0);
        assert_eq!(scores[0], 0.0);
    }

    #[test]
    fn zero_score_ties_keep_index_order() {
        let units: Vec<LegalUnit> = (0..40)
            .map(|i| unit(&format!("U{}", i), &format!("khoản số {}", i)))
            .collect();
        let index = KeywordIndex::build(&units);
        let results = index.search("rượu bia", 40);
        let citations: Vec<String> = results.iter().map(|(u, _)| u.citation().to_string()).collect();
        let expected: Vec<String> = (0..40).map(|i| format!("U{}", i)).collect();
        assert_eq!(citations, expected);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = KeywordIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.search("xe", 5).is_empty());
    }

    #[test]
    fn save_and_load_preserves_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexes").join("bm25.json");
        let index = KeywordIndex::build(&corpus());
        index.save(&path).unwrap();

        let loaded = KeywordIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded.scores("mũ bảo hiểm"), index.scores("mũ bảo hiểm"));
    }

    #[test]
    fn saved_file_is_versioned_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.json");
        KeywordIndex::build(&corpus()).save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["entries"][0]["unit"]["metadata"]["citation"], "A");
        assert_eq!(value["entries"][0]["term_freqs"]["đèn"], 1);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut file = KeywordIndex::build(&corpus()).to_file();
        file.schema_version = 99;
        let err = KeywordIndex::from_file(file).unwrap_err();
        assert!(matches!(
            err,
            KeywordIndexError::SchemaVersion { found: 99, expected: 1 }
        ));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = KeywordIndex::load(Path::new("/nonexistent/bm25.json")).unwrap_err();
        assert!(matches!(err, KeywordIndexError::NotFound(_)));
    }
}
