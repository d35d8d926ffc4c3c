//! Sparse TF-IDF vectorization.
//!
//! Terms come from an [`Analyzer`] (whole words or character n-grams inside
//! word boundaries). Weights are raw counts times smoothed IDF,
//! `ln((1 + n) / (1 + df)) + 1`, and every vector is L2-normalised so cosine
//! similarity reduces to a dot product.

use std::collections::{BTreeMap, HashMap};

use crate::config::{AnalyzerKind, RetrievalConfig, StopWords};

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or",
    "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Turns text into the terms counted by the vectorizer.
#[derive(Debug, Clone)]
pub struct Analyzer {
    kind: AnalyzerKind,
    ngram_min: usize,
    ngram_max: usize,
    stop_words: bool,
}

impl Analyzer {
    pub fn new(kind: AnalyzerKind, ngram_min: usize, ngram_max: usize, stop_words: bool) -> Self {
        let ngram_min = ngram_min.max(1);
        Self {
            kind,
            ngram_min,
            ngram_max: ngram_max.max(ngram_min),
            stop_words,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(
            config.analyzer,
            config.ngram_min,
            config.ngram_max,
            config.stop_words == StopWords::English,
        )
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        match self.kind {
            AnalyzerKind::Word => self.word_ngrams(&lowered),
            AnalyzerKind::CharWb => self.char_wb_ngrams(&lowered),
        }
    }

    fn word_ngrams(&self, text: &str) -> Vec<String> {
        let tokens: Vec<&str> = text
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| !(self.stop_words && ENGLISH_STOP_WORDS.contains(t)))
            .collect();

        let mut terms = Vec::new();
        for n in self.ngram_min..=self.ngram_max {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }

    fn char_wb_ngrams(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for word in text.split_whitespace() {
            let padded: Vec<char> = std::iter::once(' ')
                .chain(word.chars())
                .chain(std::iter::once(' '))
                .collect();
            for n in self.ngram_min..=self.ngram_max {
                if padded.len() <= n {
                    // A short word contributes itself once.
                    terms.push(padded.iter().collect());
                    break;
                }
                for window in padded.windows(n) {
                    terms.push(window.iter().collect());
                }
            }
        }
        terms
    }
}

/// L2-normalised sparse vector, entries sorted by term index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f32)>,
}

impl SparseVector {
    fn from_weights(weights: BTreeMap<usize, f32>) -> Self {
        let norm: f32 = weights.values().map(|w| w * w).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return Self::default();
        }
        Self {
            entries: weights.into_iter().map(|(i, w)| (i, w / norm)).collect(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cosine similarity against another normalised vector.
    pub fn cosine(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut dot = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (a_idx, a_w) = self.entries[i];
            let (b_idx, b_w) = other.entries[j];
            match a_idx.cmp(&b_idx) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += a_w * b_w;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot
    }
}

/// A vocabulary and IDF table fitted on a fixed document set.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    analyzer: Analyzer,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fit on `documents` and return the vectorizer with one vector per document.
    pub fn fit_transform(analyzer: Analyzer, documents: &[&str]) -> (Self, Vec<SparseVector>) {
        let doc_terms: Vec<Vec<String>> = documents.iter().map(|d| analyzer.terms(d)).collect();

        // BTreeMap gives a sorted, deterministic term order.
        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for terms in &doc_terms {
            let mut seen: Vec<&str> = terms.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        let n_docs = documents.len() as f32;
        let mut vocabulary = HashMap::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), index);
            idf.push(((1.0 + n_docs) / (1.0 + df as f32)).ln() + 1.0);
        }

        let vectorizer = Self {
            analyzer,
            vocabulary,
            idf,
        };
        let vectors = doc_terms
            .iter()
            .map(|terms| vectorizer.weigh(terms))
            .collect();
        (vectorizer, vectors)
    }

    /// Vectorize new text with the fitted vocabulary; unknown terms are dropped.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&self.analyzer.terms(text))
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut weights: BTreeMap<usize, f32> = BTreeMap::new();
        for term in terms {
            if let Some(&index) = self.vocabulary.get(term) {
                *weights.entry(index).or_insert(0.0) += 1.0;
            }
        }
        for (index, weight) in weights.iter_mut() {
            *weight *= self.idf[*index];
        }
        SparseVector::from_weights(weights)
    }
}
