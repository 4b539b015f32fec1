use once_cell::sync::Lazy;
use regex::Regex;

pub const TYPE_1_DIABETES: &str = "Type 1 Diabetes Mellitus";
pub const TYPE_2_DIABETES: &str = "Type 2 Diabetes Mellitus";
pub const GESTATIONAL_DIABETES: &str = "Gestational Diabetes Mellitus";

/// Abbreviation patterns and the canonical term each one is rewritten to.
///
/// Patterns are matched case-insensitively on word boundaries. No canonical
/// term matches any pattern, so the substitutions are idempotent.
const TERMINOLOGY: &[(&str, &str)] = &[
    (r"\bt1d\b", TYPE_1_DIABETES),
    (r"\bt1dm\b", TYPE_1_DIABETES),
    (r"\btype\s*i\s+diabetes\b", TYPE_1_DIABETES),
    (r"\biddm\b", TYPE_1_DIABETES),
    (r"\bjuvenile\s+diabetes\b", TYPE_1_DIABETES),
    (r"\bt2d\b", TYPE_2_DIABETES),
    (r"\bt2dm\b", TYPE_2_DIABETES),
    (r"\btype\s*ii\s+diabetes\b", TYPE_2_DIABETES),
    (r"\bniddm\b", TYPE_2_DIABETES),
    (r"\bgdm\b", GESTATIONAL_DIABETES),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    TERMINOLOGY
        .iter()
        .map(|(pattern, term)| {
            let regex = Regex::new(&format!("(?i){}", pattern))
                .expect("terminology patterns are valid regexes");
            (regex, *term)
        })
        .collect()
});

/// Rewrite every known abbreviation in `text` to its canonical term
pub fn canonicalize(text: &str) -> String {
    let mut out = text.to_string();
    for (regex, term) in COMPILED.iter() {
        if regex.is_match(&out) {
            out = regex.replace_all(&out, *term).into_owned();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type1_variants() {
        assert_eq!(canonicalize("T1D patients"), "Type 1 Diabetes Mellitus patients");
        assert_eq!(canonicalize("T1DM study"), "Type 1 Diabetes Mellitus study");
        assert_eq!(canonicalize("juvenile diabetes"), "Type 1 Diabetes Mellitus");
        assert_eq!(canonicalize("IDDM management"), "Type 1 Diabetes Mellitus management");
        assert_eq!(canonicalize("Type I diabetes"), "Type 1 Diabetes Mellitus");
    }

    #[test]
    fn test_type2_variants() {
        assert_eq!(canonicalize("T2D cohort"), "Type 2 Diabetes Mellitus cohort");
        assert_eq!(canonicalize("T2DM trial"), "Type 2 Diabetes Mellitus trial");
        assert_eq!(canonicalize("NIDDM study"), "Type 2 Diabetes Mellitus study");
        assert_eq!(canonicalize("type II diabetes"), "Type 2 Diabetes Mellitus");
    }

    #[test]
    fn test_gestational() {
        assert_eq!(canonicalize("GDM screening"), "Gestational Diabetes Mellitus screening");
    }

    #[test]
    fn test_word_boundaries_respected() {
        assert_eq!(canonicalize("t1dx marker"), "t1dx marker");
        assert_eq!(canonicalize("abgdm"), "abgdm");
    }

    #[test]
    fn test_canonical_terms_are_stable() {
        for term in [TYPE_1_DIABETES, TYPE_2_DIABETES, GESTATIONAL_DIABETES] {
            assert_eq!(canonicalize(term), term);
        }
    }
}
