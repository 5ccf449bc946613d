//! Intent classification and sentiment polarity — pure functions, no I/O.

use serde::{Deserialize, Serialize};

/// Business intent of an inbound email. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Invoice,
    Complaint,
    Inquiry,
    PurchaseOrder,
    Quotation,
}

impl Intent {
    /// Wire/display label, matching the serde form.
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Invoice => "invoice",
            Intent::Complaint => "complaint",
            Intent::Inquiry => "inquiry",
            Intent::PurchaseOrder => "purchase_order",
            Intent::Quotation => "quotation",
        }
    }
}

/// Classification result: label plus confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f64,
}

const INVOICE_KEYS: &[&str] = &["invoice", "inv", "payment"];
const COMPLAINT_KEYS: &[&str] = &[
    "complaint",
    "damaged",
    "delay",
    "late delivery",
    "poor quality",
    "issue",
];
const QUOTATION_KEYS: &[&str] = &["rfq", "quotation", "quote", "best price"];
const PURCHASE_ORDER_KEYS: &[&str] = &["purchase order", "po ", "po-", "order"];

/// Classify an email by subject + body keywords.
///
/// Checks are ordered — a text matching several keyword sets takes the first
/// match (invoice → complaint → quotation → purchase_order). Anything else
/// falls through to `inquiry`.
pub fn classify(subject: &str, body: &str) -> Classification {
    let text = format!("{} {}", subject.to_lowercase(), body.to_lowercase());

    let matched = |keys: &[&str]| keys.iter().any(|k| text.contains(k));

    let (intent, confidence) = if matched(INVOICE_KEYS) {
        (Intent::Invoice, 0.6)
    } else if matched(COMPLAINT_KEYS) {
        (Intent::Complaint, 0.6)
    } else if matched(QUOTATION_KEYS) {
        (Intent::Quotation, 0.6)
    } else if matched(PURCHASE_ORDER_KEYS) {
        (Intent::PurchaseOrder, 0.6)
    } else {
        (Intent::Inquiry, 0.55)
    };

    Classification { intent, confidence }
}

// ── Sentiment ───────────────────────────────────────────────────────

/// Sentiment polarity result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polarity {
    pub label: String,
    pub score: f64,
}

const POSITIVE_WORDS: &[&str] = &[
    "thanks", "thank", "great", "good", "appreciate", "excellent", "happy",
    "pleased", "wonderful", "perfect", "love", "best",
];
const NEGATIVE_WORDS: &[&str] = &[
    "complaint", "damaged", "bad", "poor", "late", "delay", "angry", "urgent",
    "unacceptable", "disappointed", "terrible", "worst", "refund", "broken",
];

/// Lexicon-based sentiment polarity over word tokens.
///
/// Compound score in [-1, 1]; label thresholds at ±0.05 (positive at or
/// above +0.05, negative at or below -0.05, neutral between).
pub fn polarity(text: &str) -> Polarity {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let mut hits = 0i64;
    let mut signed = 0i64;
    for token in &tokens {
        if POSITIVE_WORDS.contains(token) {
            hits += 1;
            signed += 1;
        } else if NEGATIVE_WORDS.contains(token) {
            hits += 1;
            signed -= 1;
        }
    }

    let score = if tokens.is_empty() || hits == 0 {
        0.0
    } else {
        // Dampened by total length so one keyword in a long email stays mild.
        let raw = signed as f64 / (tokens.len() as f64).sqrt();
        raw.clamp(-1.0, 1.0)
    };

    let label = if score >= 0.05 {
        "positive"
    } else if score <= -0.05 {
        "negative"
    } else {
        "neutral"
    };

    Polarity {
        label: label.to_string(),
        score,
    }
}
