//! Free-text cleaning for trial fields.
//!
//! A [`TextNormalizer`] is an ordered chain of [`TextRule`]s. The default
//! chain collapses whitespace, decodes HTML entities, strips control
//! characters, canonicalizes medical abbreviations, collapses repeated words
//! and collapses whitespace again. The chain is re-applied until its output
//! stops changing, so normalizing already normalized text is a no-op.

pub mod terminology;

/// HTML entities decoded by [`DecodeHtmlEntities`]
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&#39;", "'"),
    ("&quot;", "\""),
    ("&nbsp;", " "),
    ("&apos;", "'"),
];

/// Upper bound on chain passes; the default chain settles in two
const MAX_PASSES: usize = 4;

/// One idempotent string-cleaning step
pub trait TextRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, text: &str) -> String;
}

/// Collapse whitespace runs (tabs and newlines included) to one space and trim
pub struct CollapseWhitespace;

impl TextRule for CollapseWhitespace {
    fn name(&self) -> &'static str {
        "collapse_whitespace"
    }

    fn apply(&self, text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Decode the fixed entity set, repeating until nothing decodes
pub struct DecodeHtmlEntities;

impl TextRule for DecodeHtmlEntities {
    fn name(&self) -> &'static str {
        "decode_html_entities"
    }

    fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        loop {
            let next = HTML_ENTITIES
                .iter()
                .fold(out.clone(), |acc, (entity, ch)| acc.replace(entity, ch));
            if next == out {
                return out;
            }
            out = next;
        }
    }
}

/// Remove C0 control characters, DEL and the replacement character
pub struct StripControlCharacters;

impl TextRule for StripControlCharacters {
    fn name(&self) -> &'static str {
        "strip_control_characters"
    }

    fn apply(&self, text: &str) -> String {
        text.chars()
            .filter(|&c| !(c <= '\u{1f}' || c == '\u{7f}' || c == '\u{fffd}'))
            .collect()
    }
}

/// Rewrite diabetes abbreviations to canonical terms
pub struct CanonicalizeTerminology;

impl TextRule for CanonicalizeTerminology {
    fn name(&self) -> &'static str {
        "canonicalize_terminology"
    }

    fn apply(&self, text: &str) -> String {
        terminology::canonicalize(text)
    }
}

/// Drop a word when it repeats the previous kept word, ignoring case
pub struct CollapseRepeatedWords;

impl TextRule for CollapseRepeatedWords {
    fn name(&self) -> &'static str {
        "collapse_repeated_words"
    }

    fn apply(&self, text: &str) -> String {
        let mut kept: Vec<&str> = Vec::new();
        for word in text.split_whitespace() {
            match kept.last() {
                Some(prev) if prev.to_lowercase() == word.to_lowercase() => {}
                _ => kept.push(word),
            }
        }
        kept.join(" ")
    }
}

/// Ordered chain of text rules
pub struct TextNormalizer {
    rules: Vec<Box<dyn TextRule>>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    /// The standard six-step chain
    pub fn new() -> Self {
        Self::with_rules(vec![
            Box::new(CollapseWhitespace),
            Box::new(DecodeHtmlEntities),
            Box::new(StripControlCharacters),
            Box::new(CanonicalizeTerminology),
            Box::new(CollapseRepeatedWords),
            Box::new(CollapseWhitespace),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn TextRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    fn apply_once(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(&acc))
    }

    /// Clean a field. `None` in, or nothing left after cleaning, gives `None`.
    pub fn normalize(&self, text: Option<&str>) -> Option<String> {
        let mut current = self.apply_once(text?);
        for _ in 1..MAX_PASSES {
            let next = self.apply_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        if current.is_empty() {
            None
        } else {
            Some(current)
        }
    }
}
