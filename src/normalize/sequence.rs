//! Fund-family sequence markers ("Fund III", "Partners 4", "No. IX").

const ROMAN: [&str; 20] = [
    "i", "ii", "iii", "iv", "v", "vi", "vii", "viii", "ix", "x", "xi", "xii", "xiii", "xiv", "xv",
    "xvi", "xvii", "xviii", "xix", "xx",
];

/// Generic vehicle words that may follow the marker ("XII Fund").
const VEHICLE_WORDS: &[&str] = &["fund", "funds", "partners", "investors", "holdings"];

/// Sub-vehicle designators that may follow the marker ("VI-A", "VII (Cayman)").
const DESIGNATORS: &[&str] = &[
    "a", "b", "c", "d", "e", "cayman", "parallel", "feeder", "offshore", "onshore", "te", "aiv",
    "us", "usd", "eur",
];

/// Words after which a bare number reads as a fund ordinal.
const CONTEXT_WORDS: &[&str] = &[
    "fund", "funds", "partners", "partnership", "capital", "equity", "ventures", "venture",
    "opportunities", "growth", "credit", "investors", "holdings", "europe", "asia", "americas",
    "buyout", "infrastructure", "strategies", "no", "series",
];

/// Parses a lowercase roman numeral between I and XX.
#[must_use]
pub fn parse_roman(token: &str) -> Option<u32> {
    ROMAN
        .iter()
        .position(|r| *r == token)
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

fn parse_arabic(token: &str) -> Option<u32> {
    if token.is_empty() || token.len() > 2 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<u32>().ok().filter(|n| *n > 0)
}

fn is_trailer(token: &str) -> bool {
    VEHICLE_WORDS.contains(&token) || DESIGNATORS.contains(&token)
}

/// Removes the sequence marker from `tokens` and returns its value.
///
/// Vehicle words and sub-vehicle designators after the marker are skipped
/// and kept in `tokens`. Of two trailing numerals the larger is the fund
/// number and the smaller a sub-fund designator ("Fund IX II").
pub(crate) fn extract_sequence(tokens: &mut Vec<String>) -> Option<u32> {
    let mut end = tokens.len();
    while end > 0 && is_trailer(&tokens[end - 1]) {
        end -= 1;
    }
    if end < 2 {
        return None;
    }

    let mut idx = end - 1;
    if idx >= 2 {
        if let (Some(last), Some(before)) = (parse_roman(&tokens[idx]), parse_roman(&tokens[idx - 1])) {
            if before > last {
                idx -= 1;
            }
        }
    }

    let prev = tokens[idx - 1].as_str();
    let after_context = CONTEXT_WORDS.contains(&prev);

    let value = match parse_roman(&tokens[idx]) {
        // A lone "I" is usually a pronoun or initial unless it follows a fund word.
        Some(1) if !after_context => return None,
        Some(n) => n,
        None if after_context => parse_arabic(&tokens[idx])?,
        None => return None,
    };

    tokens.remove(idx);
    if idx > 0 && tokens[idx - 1] == "no" {
        tokens.remove(idx - 1);
    }
    Some(value)
}
