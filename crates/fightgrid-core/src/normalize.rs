//! Canonical comparison keys for person names and category labels.
//!
//! Upstream sources disagree on diacritics, apostrophe styles, hyphenation,
//! and generational suffixes; everything that compares names does so through
//! these keys.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Generational suffixes dropped as whole words.
const SUFFIX_WORDS: &[&str] = &["jr", "sr", "ii", "iii"];

/// Normalize a person name into its comparison key.
///
/// NFD-decomposes and strips combining marks, maps the non-decomposable
/// letter variants to ASCII, removes quote/apostrophe variants, turns
/// hyphens into spaces, drops periods/commas and standalone generational
/// suffixes, collapses whitespace, and lowercases. Total and idempotent:
/// `normalize_name(normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(raw: &str) -> String {
    let mut mapped = String::with_capacity(raw.len());
    for ch in raw.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            'ł' => mapped.push('l'),
            'Ł' => mapped.push('L'),
            'ø' => mapped.push('o'),
            'Ø' => mapped.push('O'),
            'æ' => mapped.push_str("ae"),
            'Æ' => mapped.push_str("AE"),
            'ß' => mapped.push_str("ss"),
            'ð' => mapped.push('d'),
            'Ð' => mapped.push('D'),
            'þ' => mapped.push_str("th"),
            'Þ' => mapped.push_str("Th"),
            '\'' | '\u{2019}' | '\u{2018}' | '`' | '\u{00B4}' => {}
            '"' | '\u{201C}' | '\u{201D}' | '\u{201E}' => {}
            '-' | '\u{2010}' | '\u{2013}' | '\u{2014}' => mapped.push(' '),
            '.' | ',' => {}
            _ => mapped.push(ch),
        }
    }

    let mut words = Vec::new();
    for word in mapped.split_whitespace() {
        let word = word.to_lowercase();
        if SUFFIX_WORDS.contains(&word.as_str()) {
            continue;
        }
        words.push(word);
    }
    words.join(" ")
}

/// Normalized full name with internal spaces removed. Catches compound
/// surnames hyphenated in one source and space-separated in another.
pub fn compact_name(raw: &str) -> String {
    normalize_name(raw).replace(' ', "")
}

/// Light normalization for category labels (weight-class names) before table
/// lookup: keep ASCII letters only, uppercased.
pub fn normalize_label(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "Jiří Procházka",
            "Jan Błachowicz",
            "Da'Mon Blackshear Jr.",
            "  José   Aldo  ",
            "Cortes-Acosta",
            "O'Malley",
        ];
        for input in inputs {
            let once = normalize_name(input);
            assert_eq!(normalize_name(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn diacritics_collapse_to_ascii() {
        assert_eq!(normalize_name("Jiří Procházka"), normalize_name("Jiri Prochazka"));
        assert_eq!(normalize_name("Jan Błachowicz"), normalize_name("Jan Blachowicz"));
        assert_eq!(normalize_name("José Aldo"), "jose aldo");
        assert_eq!(normalize_name("Gegard Mousasí"), "gegard mousasi");
    }

    #[test]
    fn letter_variants_map_to_ascii_equivalents() {
        assert_eq!(normalize_name("Søren"), "soren");
        assert_eq!(normalize_name("Æsir"), "aesir");
        assert_eq!(normalize_name("Weiß"), "weiss");
        assert_eq!(normalize_name("Þór Guðmundsson"), "thor gudmundsson");
    }

    #[test]
    fn apostrophes_and_quotes_are_stripped() {
        assert_eq!(normalize_name("O'Malley"), "omalley");
        assert_eq!(normalize_name("O\u{2019}Malley"), "omalley");
        assert_eq!(normalize_name("Du`Quesne"), "duquesne");
    }

    #[test]
    fn hyphens_become_spaces_and_compact_form_ignores_them() {
        assert_eq!(normalize_name("Cortes-Acosta"), "cortes acosta");
        assert_eq!(compact_name("Cortes-Acosta"), compact_name("Cortes Acosta"));
    }

    #[test]
    fn generational_suffixes_drop_as_whole_words() {
        assert_eq!(normalize_name("Roberto Duran Jr."), "roberto duran");
        assert_eq!(normalize_name("Frank Mir III"), "frank mir");
        // "jrue" is not the suffix "jr"
        assert_eq!(normalize_name("Jrue Smith"), "jrue smith");
    }

    #[test]
    fn whitespace_collapses_and_result_is_trimmed() {
        assert_eq!(normalize_name("  Israel   Adesanya  "), "israel adesanya");
    }

    #[test]
    fn label_normalization_keeps_letters_only() {
        assert_eq!(normalize_label("Light Heavyweight"), "LIGHTHEAVYWEIGHT");
        assert_eq!(normalize_label("L.Heavyweight"), "LHEAVYWEIGHT");
        assert_eq!(normalize_label("Women's Strawweight"), "WOMENSSTRAWWEIGHT");
    }
}
