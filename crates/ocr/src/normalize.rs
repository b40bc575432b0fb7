//! Canonical text forms for OCR output.

use crate::patterns;

/// Canonicalize raw OCR text while keeping its line structure.
///
/// Horizontal whitespace (NBSP included) collapses to single spaces,
/// typographic dashes and the minus sign become `-`, a stray `S` before a
/// two-decimal number becomes `$`, lines are trimmed and blank runs collapse
/// to a single empty line. Applying it twice changes nothing.
pub fn normalize(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut last_blank = true;
    for raw in text.lines() {
        let line = raw
            .chars()
            .map(unify_dash)
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let line = patterns::repair_dollar_s(&line);
        if line.is_empty() {
            if !last_blank {
                out.push(String::new());
            }
            last_blank = true;
        } else {
            out.push(line);
            last_blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Single-line, lower-cased form the price rules run against. Foreign
/// currency marks and `usd` are read as `$`.
pub fn fold_for_rules(text: &str) -> String {
    normalize(text)
        .to_lowercase()
        .replace("usd", "$")
        .replace(['£', '€'], "$")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn unify_dash(c: char) -> char {
    match c {
        '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t\n "), "");
    }

    #[test]
    fn collapses_whitespace_and_blank_runs() {
        let text = "  Fresh\u{a0}\u{a0}Salmon  \n\n\n\t$9.99 /lb \n";
        assert_eq!(normalize(text), "Fresh Salmon\n\n$9.99 /lb");
    }

    #[test]
    fn unifies_dashes() {
        assert_eq!(normalize("$5\u{2013}$7"), "$5-$7");
        assert_eq!(normalize("Dec 3 \u{2014} 9"), "Dec 3 - 9");
        assert_eq!(normalize("\u{2212}1.00"), "-1.00");
    }

    #[test]
    fn repairs_s_for_dollar() {
        assert_eq!(normalize("Apples S 1.99"), "Apples $1.99");
        assert_eq!(normalize("S1.99 ea"), "$1.99 ea");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "  BOGO \n\n\n Buy one   get one\u{a0}free ",
            "S 1.99\r\n\r\nReg. S3.49",
            "2/$5.00\nCanned Soup",
            "Valid 12/28\u{2013}01/03\n\n\n",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn fold_for_rules_flattens() {
        assert_eq!(fold_for_rules("Sale\nNOW  €4.99"), "sale now $4.99");
        assert_eq!(fold_for_rules("5 USD\n\nonly"), "5 $ only");
    }

    /// Every three-fragment combination of OCR-ish pieces.
    fn corpus() -> Vec<String> {
        const PIECES: [&str; 16] = [
            "", "  ", "S 1.99", "2/$5.00", "BOGO", "Reg. $3.49", "20% off", "\u{2013}",
            "\u{a0}", "\n\n\n", "\r\n", "Limit 2", "$", "1/$0", "Valid 12/28-01/03", "Canned Soup",
        ];
        let mut out = Vec::with_capacity(PIECES.len().pow(3));
        for a in PIECES {
            for b in PIECES {
                for c in PIECES {
                    out.push(format!("{a} {b}\n{c}"));
                }
            }
        }
        out
    }

    #[test]
    fn idempotent_over_generated_corpus() {
        for s in corpus() {
            let once = normalize(&s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}
