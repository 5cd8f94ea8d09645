//! Post-processing: deterministic cleanup of extracted page text.
//!
//! Both text-layer extraction and OCR produce artefacts that carry no
//! content: Windows line endings, form feeds between sections, zero-width
//! characters left by PDF producers, ragged runs of spaces from column
//! layout, and sentences glued together where a line break was dropped.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything splits on `\n`, and
//! whitespace is collapsed before lines are trimmed so a line made only of
//! tabs ends up empty and is folded by the blank-line rule.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to one page of text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF/CR → LF) and form feeds
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Collapse runs of spaces and tabs to a single space
/// 4. Trim each line
/// 5. Insert the missing space in `end.Next`
/// 6. Collapse 3+ consecutive newlines to one blank line
/// 7. Trim the whole text
///
/// The result is a fixed point: `normalize_text(normalize_text(s)) == normalize_text(s)`.
pub fn normalize_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_inline_whitespace(&s);
    let s = trim_lines(&s);
    let s = space_after_sentences(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}'], "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Collapse inline whitespace ───────────────────────────────────────

static RE_INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}|\t").unwrap());

fn collapse_inline_whitespace(input: &str) -> String {
    RE_INLINE_WS.replace_all(input, " ").to_string()
}

// ── Rule 4: Trim each line ───────────────────────────────────────────────────

fn trim_lines(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Space after sentence punctuation ────────────────────────────────
//
// `lowercase [.!?] Uppercase lowercase` gets a space after the punctuation.
// Requiring a lowercase letter after the capital leaves abbreviations such
// as `U.S.A` and decimals alone. A regex replace would consume the leading
// letter and miss chained cases like `a.Bc.De` on the first pass, so this
// scans with a sliding window instead.

fn space_after_sentences(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        let glued = matches!(c, '.' | '!' | '?')
            && i > 0
            && chars[i - 1].is_lowercase()
            && chars.get(i + 1).is_some_and(|n| n.is_uppercase())
            && chars.get(i + 2).is_some_and(|n| n.is_lowercase());
        if glued {
            out.push(' ');
        }
    }
    out
}

// ── Rule 6: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc\u{000C}d"), "a\nb\nc\nd");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("Pa\u{200B}tient\u{FEFF}"), "Patient");
        assert_eq!(remove_invisible_chars("hy\u{00AD}phen"), "hyphen");
    }

    #[test]
    fn test_collapse_inline_whitespace() {
        assert_eq!(collapse_inline_whitespace("a    b\t\tc\td"), "a b c d");
        assert_eq!(collapse_inline_whitespace("a b"), "a b");
    }

    #[test]
    fn test_trim_lines() {
        assert_eq!(trim_lines("  hello   \n\t world  "), "hello\nworld");
    }

    #[test]
    fn test_space_after_sentences() {
        assert_eq!(space_after_sentences("stable.Next visit"), "stable. Next visit");
        assert_eq!(space_after_sentences("done!Then"), "done! Then");
        assert_eq!(space_after_sentences("a.Bc.De"), "a. Bc. De");
    }

    #[test]
    fn test_sentence_rule_leaves_abbreviations() {
        assert_eq!(space_after_sentences("U.S.A"), "U.S.A");
        assert_eq!(space_after_sentences("dose 2.5mg"), "dose 2.5mg");
        assert_eq!(space_after_sentences("e.g.X"), "e.g.X");
    }

    #[test]
    fn test_mixed_case_and_decimals_untouched() {
        let input = "pH 7.4, BP 120 mmHg\niPhone photo sent to Dr McDonald";
        assert_eq!(normalize_text(input), input);
        assert_eq!(normalize_text("Hb 13.2g/dL"), "Hb 13.2g/dL");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_normalize_text_full_pipeline() {
        let input = "\u{FEFF}  Patient:   Jane Doe  \r\n\r\n\r\n\r\nDOB:\t01/02/1980.Seen today \u{000C}\n";
        assert_eq!(
            normalize_text(input),
            "Patient: Jane Doe\n\nDOB: 01/02/1980.Seen today"
        );
    }

    #[test]
    fn test_normalize_text_glued_sentence() {
        assert_eq!(
            normalize_text("Blood pressure stable.Patient discharged."),
            "Blood pressure stable. Patient discharged."
        );
    }

    #[test]
    fn test_normalize_text_empty_and_blank() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text(" \t\n\r\n \u{200B} "), "");
    }

    #[test]
    fn test_normalize_text_idempotent() {
        let samples = [
            "a  \t b\r\n\r\n\r\n\r\nc.Dd  ",
            "  x.Yz.Wq\u{00AD}  \n\n\n\n\n  end ",
            "\u{000C}\u{000C}Title\n\t\n\t\nBody text.More text",
            "one\r\rtwo\r\r\rthree",
        ];
        for s in samples {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "not idempotent for {s:?}");
        }
    }
}
