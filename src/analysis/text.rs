//! Body-text normalization and intent pattern scanning.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize body text to defeat stylized/homoglyph obfuscation.
///
/// NFKC folds mathematical/stylized letters back to ASCII, zero-width
/// characters are stripped, whitespace runs collapse to a single space, and
/// the result is lowercased.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let folded: String = text
        .nfkc()
        .filter(|c| !matches!(c, '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{2060}' | '\u{feff}'))
        .collect();

    WHITESPACE_RE
        .replace_all(&folded, " ")
        .trim()
        .to_lowercase()
}

/// A threat category with its patterns, severity, and reason message.
struct IntentCategory {
    label: &'static str,
    message: &'static str,
    severity: u8,
    patterns: Vec<Regex>,
}

/// Regex scanner for urgency, credential-theft, and financial intent.
///
/// Each category matches at most once — the first pattern hit wins — and
/// contributes its severity once. Severities sum across distinct categories.
pub struct IntentScanner {
    categories: Vec<IntentCategory>,
}

/// One matched category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentMatch {
    pub severity: u8,
    /// Human-readable reason, e.g. `"High Urgency Detected (Urgency)"`.
    pub reason: String,
}

impl IntentScanner {
    /// Build the scanner with the default pattern set. Patterns are compiled
    /// once; word boundaries keep partial matches out.
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("intent pattern must compile"))
                .collect()
        };

        let categories = vec![
            IntentCategory {
                label: "Urgency",
                message: "High Urgency Detected",
                severity: 40,
                patterns: compile(&[
                    r"(?i)\b(urgent|immediate|immediately|critical|24\s*hours|48\s*hours)\b",
                    r"(?i)\b(suspend|suspended|terminate|restrict|lock|blocked|expire|closing)\b",
                    r"(?i)\b(act\s+now|action\s+required|final\s+notice|deletion)\b",
                ]),
            },
            IntentCategory {
                label: "Credential Theft",
                message: "Credential Harvesting Pattern",
                severity: 40,
                patterns: compile(&[
                    r"(?i)\b(password|login|verify\s+account|update\s+details|confirm\s+identity)\b",
                    r"(?i)\b(click\s+here|sign\s+in|validate|unusual\s+activity)\b",
                    r"(?i)\b(reactivate|secure\s+your\s+account)\b",
                ]),
            },
            IntentCategory {
                label: "Financial",
                message: "Financial/Payment Request",
                severity: 20,
                patterns: compile(&[
                    r"(?i)\b(bank|transfer|invoice|payment|account\s+details|bitcoin|wallet)\b",
                    r"(?i)\b(overdue|unpaid|refund|wire)\b",
                ]),
            },
        ];

        Self { categories }
    }

    /// Scan normalized text against all categories.
    ///
    /// Returns the matches in category order; the caller sums severities.
    pub fn scan(&self, text: &str) -> Vec<IntentMatch> {
        let mut matches = Vec::new();
        for category in &self.categories {
            if category.patterns.iter().any(|p| p.is_match(text)) {
                matches.push(IntentMatch {
                    severity: category.severity,
                    reason: format!("{} ({})", category.message, category.label),
                });
            }
        }
        matches
    }
}

impl Default for IntentScanner {
    fn default() -> Self {
        Self::new()
    }
}
