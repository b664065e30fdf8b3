//! Tool retriever: ranks catalog entries against a free-text query.
//!
//! Each tool is turned into one text document (name, description, keywords,
//! category, tags, input-parameter descriptions).  The documents plus the
//! query are embedded in a TF-IDF vector space that is rebuilt from scratch
//! on every call, and tools are ranked by cosine similarity to the query.
//!
//! | Step | Rule |
//! |------|------|
//! | Tokens | lowercase runs of two or more word characters, English stop-words removed |
//! | TF | raw term count |
//! | IDF | `ln((1 + n) / (1 + df)) + 1` over the `n` documents including the query |
//! | Norm | each vector scaled to unit length |
//!
//! A score of exactly zero means the tool shares no discriminative term with
//! the query; such tools are never returned.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::catalog::ToolDescriptor;

// ---------------------------------------------------------------------------
// Tokenisation
// ---------------------------------------------------------------------------

/// Two or more word characters, Unicode-aware.
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// The standard English stop-word list used by common TF-IDF toolkits.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot",
    "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do", "done",
    "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else", "elsewhere",
    "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything", "everywhere",
    "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five", "for", "former",
    "formerly", "forty", "found", "four", "from", "front", "full", "further", "get", "give", "go",
    "had", "has", "hasnt", "have", "he", "hence", "her", "here", "hereafter", "hereby", "herein",
    "hereupon", "hers", "herself", "him", "himself", "his", "how", "however", "hundred", "i", "ie",
    "if", "in", "inc", "indeed", "interest", "into", "is", "it", "its", "itself", "keep", "last",
    "latter", "latterly", "least", "less", "ltd", "made", "many", "may", "me", "meanwhile",
    "might", "mill", "mine", "more", "moreover", "most", "mostly", "move", "much", "must", "my",
    "myself", "name", "namely", "neither", "never", "nevertheless", "next", "nine", "no", "nobody",
    "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once",
    "one", "only", "onto", "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out",
    "over", "own", "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see",
    "seem", "seemed", "seeming", "seems", "serious", "several", "she", "should", "show", "side",
    "since", "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something",
    "sometime", "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that",
    "the", "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together", "too",
    "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up", "upon",
    "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when", "whence",
    "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon", "wherever",
    "whether", "which", "while", "whither", "who", "whoever", "whole", "whom", "whose", "why",
    "will", "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Split text into lowercase retrieval tokens with stop-words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_owned)
        .collect()
}

/// Build the text document that represents a tool in the vector space.
///
/// Absent optional fields contribute nothing.
pub fn tool_document(tool: &ToolDescriptor) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(4 + tool.keywords.len() + tool.tags.len());
    parts.push(&tool.name);
    parts.push(&tool.description);
    parts.extend(tool.keywords.iter().map(String::as_str));
    if let Some(category) = &tool.category {
        parts.push(category);
    }
    parts.extend(tool.tags.iter().map(String::as_str));
    parts.extend(
        tool.input
            .iter()
            .filter_map(|(_, spec)| spec.description.as_deref()),
    );
    parts.join(" ")
}

// ---------------------------------------------------------------------------
// Vector space
// ---------------------------------------------------------------------------

/// Sparse unit-length TF-IDF vector keyed by term.
///
/// A `BTreeMap` keeps iteration (and therefore floating-point summation)
/// order fixed, so identical inputs give bit-identical scores.
type SparseVector = BTreeMap<String, f64>;

fn term_counts(tokens: Vec<String>) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0.0) += 1.0;
    }
    counts
}

/// Embed every document in a fresh TF-IDF space.
fn vectorize(documents: &[String]) -> Vec<SparseVector> {
    let counts: Vec<BTreeMap<String, f64>> = documents
        .iter()
        .map(|doc| term_counts(tokenize(doc)))
        .collect();

    let mut document_frequency: BTreeMap<&str, f64> = BTreeMap::new();
    for doc in &counts {
        for term in doc.keys() {
            *document_frequency.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
    }

    let n = documents.len() as f64;
    counts
        .iter()
        .map(|doc| {
            let mut vector: SparseVector = doc
                .iter()
                .map(|(term, tf)| {
                    let df = document_frequency.get(term.as_str()).copied().unwrap_or(0.0);
                    let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
                    (term.clone(), tf * idf)
                })
                .collect();

            let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                for weight in vector.values_mut() {
                    *weight /= norm;
                }
            }
            vector
        })
        .collect()
}

/// Cosine similarity of two unit vectors.
fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    dot.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// A catalog entry paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTool<'a> {
    pub tool: &'a ToolDescriptor,
    /// Cosine similarity in `[0, 1]`.
    pub score: f64,
}

/// Score every tool against the query, in catalog order.
pub fn score_all<'a>(query: &str, tools: &'a [ToolDescriptor]) -> Vec<ScoredTool<'a>> {
    if tools.is_empty() {
        return Vec::new();
    }

    let mut documents: Vec<String> = tools.iter().map(tool_document).collect();
    documents.push(query.to_owned());

    let mut vectors = vectorize(&documents);
    let query_vector = vectors.pop().unwrap_or_default();

    tools
        .iter()
        .zip(vectors.iter())
        .map(|(tool, vector)| ScoredTool {
            tool,
            score: cosine(&query_vector, vector),
        })
        .collect()
}

/// Scored candidates with a positive score, best first, at most `top_n`.
///
/// Ties keep catalog order.
pub fn rank_scored<'a>(
    query: &str,
    tools: &'a [ToolDescriptor],
    top_n: usize,
) -> Vec<ScoredTool<'a>> {
    let mut scored: Vec<ScoredTool<'a>> = score_all(query, tools)
        .into_iter()
        .filter(|s| s.score > 0.0)
        .collect();

    // `sort_by` is stable, so equal scores stay in catalog order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_n);

    debug!(
        query = %query,
        candidates = scored.len(),
        top = ?scored.first().map(|s| (&s.tool.name, s.score)),
        "tools ranked"
    );

    scored
}

/// The `top_n` tools most relevant to `query`, best first.
///
/// Returns fewer than `top_n` tools (possibly none) when fewer tools share
/// any term with the query.  An empty result means "no relevant tools".
pub fn rank(query: &str, tools: &[ToolDescriptor], top_n: usize) -> Vec<ToolDescriptor> {
    rank_scored(query, tools, top_n)
        .into_iter()
        .map(|s| s.tool.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new("send_email_tool", "Send an email message to a recipient")
                .with_input("to", "string", "Recipient email address")
                .with_input("content", "string", "Body of the email")
                .with_keywords(["mail", "inbox", "boss"]),
            ToolDescriptor::new("parse_csv_tool", "Parse a CSV file into rows")
                .with_input("file", "string", "Path to the CSV file")
                .with_category("data"),
            ToolDescriptor::new("send_sms_tool", "Send an SMS text message to a phone")
                .with_input("recipients", "list[str]", "Recipient phone numbers")
                .with_tags(["sms", "mobile"]),
            ToolDescriptor::new("summarize_text_tool", "Summarize a long report into key points")
                .with_input("text", "string", "Text to summarize"),
        ]
    }

    #[test]
    fn tokenize_lowercases_and_drops_stop_words() {
        let tokens = tokenize("Email MY boss the Q3 report, please!");
        assert_eq!(tokens, vec!["email", "boss", "q3", "report"]);
    }

    #[test]
    fn tokenize_drops_full_english_stop_word_list() {
        assert_eq!(ENGLISH_STOP_WORDS.len(), 318);
        let tokens = tokenize("Get the first two files, find and show system totals");
        assert_eq!(tokens, vec!["files", "totals"]);
        // Not on the list.
        assert_eq!(tokenize("did does just"), vec!["did", "does", "just"]);
    }

    #[test]
    fn tokenize_drops_single_characters() {
        assert_eq!(tokenize("a b c ? x1"), vec!["x1"]);
    }

    #[test]
    fn tool_document_includes_all_fields() {
        let tool = ToolDescriptor::new("t_tool", "does things")
            .with_category("cat")
            .with_tags(["tag1"])
            .with_keywords(["kw"])
            .with_input("p", "string", "param description");
        let doc = tool_document(&tool);
        for part in ["t_tool", "does things", "cat", "tag1", "kw", "param description"] {
            assert!(doc.contains(part), "missing {part} in {doc}");
        }
    }

    #[test]
    fn email_query_ranks_email_tool_first() {
        let tools = sample_tools();
        let ranked = rank("email my boss the report", &tools, 12);
        assert_eq!(ranked[0].name, "send_email_tool");
        assert!(ranked.iter().all(|t| t.name != "parse_csv_tool"));
    }

    #[test]
    fn zero_scores_are_excluded() {
        let tools = sample_tools();
        let scored = score_all("email", &tools);
        assert!(scored.iter().any(|s| s.score == 0.0));

        let ranked = rank_scored("email", &tools, 10);
        assert!(ranked.iter().all(|s| s.score > 0.0));
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn unrelated_query_yields_nothing() {
        let tools = sample_tools();
        assert!(rank("quantum chromodynamics", &tools, 5).is_empty());
        assert!(rank("the of and", &tools, 5).is_empty());
        assert!(rank("", &tools, 5).is_empty());
    }

    #[test]
    fn result_is_bounded_by_top_n_and_catalog() {
        let tools = sample_tools();
        assert!(rank("send message text email sms", &tools, 1).len() <= 1);
        assert!(rank("send message text email sms", &tools, 100).len() <= tools.len());
        assert!(rank("send message", &tools, 0).is_empty());
    }

    #[test]
    fn ranking_is_deterministic() {
        let tools = sample_tools();
        let first = rank_scored("send a summary report by email or sms", &tools, 3);
        for _ in 0..10 {
            let again = rank_scored("send a summary report by email or sms", &tools, 3);
            assert_eq!(first, again);
        }
    }

    #[test]
    fn ties_keep_catalog_order() {
        let tools = vec![
            ToolDescriptor::new("alpha_widget", "widget helper"),
            ToolDescriptor::new("beta_widget", "widget helper"),
            ToolDescriptor::new("gamma_widget", "widget helper"),
        ];
        let scored = rank_scored("widget helper", &tools, 3);
        assert_eq!(scored.len(), 3);
        assert_eq!(scored[0].score, scored[1].score);
        let names: Vec<&str> = scored.iter().map(|s| s.tool.name.as_str()).collect();
        assert_eq!(names, vec!["alpha_widget", "beta_widget", "gamma_widget"]);
    }

    #[test]
    fn scores_are_within_unit_interval() {
        let tools = sample_tools();
        for s in score_all("send email sms report csv", &tools) {
            assert!((0.0..=1.0).contains(&s.score), "score {} out of range", s.score);
        }
    }

    #[test]
    fn empty_catalog_yields_nothing() {
        assert!(rank("email", &[], 5).is_empty());
    }
}
