//! Fund and general-partner name normalization.
//!
//! Everything here is pure: no I/O, no shared state beyond compiled regexes,
//! and no failure modes. Missing or empty input produces an empty token list.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::record::RawFundRecord;

pub mod gp;
mod sequence;

pub use gp::GpAliasTable;
pub use sequence::parse_roman;

/// Dotted legal forms that would otherwise split into stray letter tokens.
const DOTTED_LEGAL_FORMS: &str = r"(?i)\b(?:l\.\s?l\.\s?l\.\s?p|l\.\s?l\.\s?p|l\.\s?l\.\s?c|l\.\s?p|s\.\s?c\.\s?sp|s\.\s?[aà]\.?\s?r\.\s?l)\b\.?";

/// Legal suffix at the very end of a display name.
const TRAILING_LEGAL_SUFFIX: &str = r"(?i)[\s,]*\b(?:l\.?\s?l\.?\s?l\.?\s?p|l\.?\s?l\.?\s?p|l\.?\s?l\.?\s?c|l\.?\s?p|ltd|limited|inc|co|scsp|s\.c\.sp|plc|gmbh|s\.?[aà]\.?\s?r\.?\s?l)\.?\s*$";

/// Legal-entity tokens dropped wherever they appear.
const LEGAL_TOKENS: &[&str] = &[
    "lp", "llc", "ltd", "limited", "inc", "incorporated", "scsp", "sarl", "gmbh", "plc", "llp",
    "lllp", "sicav", "sca",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("fd", "fund"),
    ("prtrs", "partners"),
    ("ptnrs", "partners"),
    ("cap", "capital"),
    ("mgmt", "management"),
    ("intl", "international"),
    ("inv", "investment"),
];

/// Words that appear in nearly every fund name and identify nothing.
const GENERIC_TOKENS: &[&str] = &[
    "fund", "funds", "capital", "partners", "partner", "investment", "investments", "equity",
    "ventures", "venture", "credit", "group", "management", "global", "international",
    "opportunities", "special", "situations", "growth", "buyout", "real", "estate",
    "infrastructure", "the", "of", "and", "new", "north", "south", "east", "west", "a", "b", "c",
    "d", "e", "co", "no", "series", "coinvestment", "co-investment", "te", "us", "europe", "asia",
    "america", "americas", "latin", "pacific", "private", "holdings", "investors",
];

/// Keywords that mark a distinct strategy or geography sleeve of a fund family.
const STRATEGY_KEYWORDS: &[&str] = &["credit", "asia", "europe", "latin", "real", "infrastructure"];

fn dotted_legal_forms() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DOTTED_LEGAL_FORMS).ok()).as_ref()
}

fn trailing_legal_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TRAILING_LEGAL_SUFFIX).ok()).as_ref()
}

/// A fund name reduced to comparable tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedName {
    /// Lowercased tokens in original order, sequence marker removed.
    pub tokens: Vec<String>,
    /// Fund-family ordinal such as 3 for "Fund III".
    pub sequence_number: Option<u32>,
}

impl NormalizedName {
    /// Returns true if no comparable tokens remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Tokens sorted alphabetically and joined by single spaces.
    #[must_use]
    pub fn sorted_key(&self) -> String {
        sorted_key(&self.tokens)
    }
}

/// An incoming record after normalization, ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    /// Trimmed raw fund name.
    pub raw_name: String,
    /// Trimmed source system ID.
    pub source_id: String,
    /// Normalized fund name.
    pub name: NormalizedName,
    /// Trimmed GP string, if any.
    pub gp_raw: Option<String>,
    /// GP key after alias lookup and normalization.
    pub gp_key: Option<String>,
    /// Vintage year as reported.
    pub vintage_year: Option<i32>,
}

/// Sorts tokens and joins them with single spaces.
#[must_use]
pub fn sorted_key(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

/// Splits a raw name into lowercase tokens with legal forms removed and
/// abbreviations expanded.
fn tokenize(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let undotted = match dotted_legal_forms() {
        Some(re) => re.replace_all(trimmed, " ").into_owned(),
        None => trimmed.to_string(),
    };

    let lowered = undotted.replace(['\'', '\u{2019}'], "").to_lowercase();

    let mut tokens: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .filter(|t| !LEGAL_TOKENS.contains(t))
        .map(|t| {
            ABBREVIATIONS
                .iter()
                .find(|(short, _)| *short == t)
                .map_or_else(|| t.to_string(), |(_, long)| (*long).to_string())
        })
        .collect();

    while tokens.len() > 1 && tokens.last().is_some_and(|t| t == "co") {
        tokens.pop();
    }

    tokens
}

/// Normalizes a raw fund name.
///
/// # Examples
///
/// ```
/// use fundlink::normalize::normalize_name;
///
/// let n = normalize_name("Riverside Capital Partners III, L.P.");
/// assert_eq!(n.tokens, vec!["riverside", "capital", "partners"]);
/// assert_eq!(n.sequence_number, Some(3));
/// ```
#[must_use]
pub fn normalize_name(raw: &str) -> NormalizedName {
    let mut tokens = tokenize(raw);
    let sequence_number = sequence::extract_sequence(&mut tokens);
    NormalizedName {
        tokens,
        sequence_number,
    }
}

/// Normalizes a general-partner name without consulting aliases.
///
/// Returns `None` when nothing comparable is left.
#[must_use]
pub fn normalize_gp_name(raw: &str) -> Option<String> {
    let tokens = tokenize(raw);
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Normalizes a whole record, resolving the GP through `gp_aliases` first.
#[must_use]
pub fn normalize_record(record: &RawFundRecord, gp_aliases: &GpAliasTable) -> NormalizedRecord {
    let mut name = normalize_name(&record.raw_fund_name);
    if name.sequence_number.is_none() {
        name.sequence_number = record.sequence_hint;
    }

    let gp_raw = record
        .general_partner_raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let gp_key = gp_raw.as_deref().and_then(|gp| gp_aliases.canonical_key(gp));

    NormalizedRecord {
        raw_name: record.raw_fund_name.trim().to_string(),
        source_id: record.source_system_id.trim().to_string(),
        name,
        gp_raw,
        gp_key,
        vintage_year: record.vintage_year,
    }
}

/// Human-readable form of a raw name: trimmed, legal suffix removed,
/// whitespace collapsed, original case kept.
#[must_use]
pub fn display_name(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let Some(re) = trailing_legal_suffix() else {
        return collapsed;
    };

    let mut current = collapsed.clone();
    loop {
        let stripped = re.replace(&current, "").into_owned();
        let stripped = stripped
            .trim_end_matches(|c: char| c == ',' || c == '&' || c == '-' || c.is_whitespace())
            .to_string();
        if stripped == current || stripped.is_empty() {
            break;
        }
        current = stripped;
    }

    if current.is_empty() {
        collapsed
    } else {
        current
    }
}

/// True if `token` is a generic industry word.
#[must_use]
pub fn is_generic_token(token: &str) -> bool {
    GENERIC_TOKENS.contains(&token)
}

/// True if the name has no distinctive token at all.
///
/// Such names ("Capital Partners Fund") cannot be told apart from their
/// neighbours by text alone.
#[must_use]
pub fn is_low_distinctiveness(tokens: &[String]) -> bool {
    tokens.iter().all(|t| is_generic_token(t))
}

/// Jaccard overlap of the distinctive (non-generic) tokens of two names.
///
/// `None` when either side has no distinctive token, since there is then
/// nothing to compare.
#[must_use]
pub fn distinctive_overlap(a: &[String], b: &[String]) -> Option<f64> {
    let left: BTreeSet<&str> = a.iter().map(String::as_str).filter(|t| !is_generic_token(t)).collect();
    let right: BTreeSet<&str> = b.iter().map(String::as_str).filter(|t| !is_generic_token(t)).collect();
    if left.is_empty() || right.is_empty() {
        return None;
    }
    let shared = left.intersection(&right).count();
    let union = left.union(&right).count();
    #[allow(clippy::cast_precision_loss)]
    let overlap = shared as f64 / union as f64;
    Some(overlap)
}

/// Best-effort general partner read off a fund name.
///
/// Fund families are usually named "<firm> [Fund] <number>", so the firm is
/// what remains after dropping the legal suffix, a trailing parenthetical,
/// the fund number with its sub-vehicle designator, a trailing "Fund", a
/// vintage year and a share-class letter.
///
/// ```
/// use fundlink::normalize::gp_from_fund_name;
///
/// assert_eq!(gp_from_fund_name("KKR 2006 Fund, L.P.").as_deref(), Some("KKR"));
/// assert_eq!(
///     gp_from_fund_name("Vista Equity Partners Fund VI-A, L.P.").as_deref(),
///     Some("Vista Equity Partners")
/// );
/// ```
#[must_use]
pub fn gp_from_fund_name(raw: &str) -> Option<String> {
    let mut name = display_name(raw);
    if name.ends_with(')') {
        if let Some(open) = name.rfind('(') {
            name.truncate(open);
        }
    }
    let mut words: Vec<&str> = name.split_whitespace().collect();

    let is_number = |w: &str| {
        let head = w.split('-').next().unwrap_or(w);
        parse_roman(&head.to_lowercase()).is_some()
    };
    let is_fund = |w: &str| w.eq_ignore_ascii_case("fund");

    if words.len() > 1 && words.last().is_some_and(|w| is_number(*w)) {
        words.pop();
    }
    if words.len() > 1 && words.last().is_some_and(|w| is_fund(*w)) {
        words.pop();
    }
    if words.len() > 1
        && words
            .last()
            .is_some_and(|w| w.len() == 4 && w.bytes().all(|b| b.is_ascii_digit()))
    {
        words.pop();
    }
    if words.len() > 1
        && words
            .last()
            .is_some_and(|w| matches!(*w, "A" | "B" | "C" | "D"))
    {
        words.pop();
    }

    let gp = words
        .join(" ")
        .trim_end_matches(|c: char| c == ',' || c == '-' || c.is_whitespace())
        .to_string();
    if gp.is_empty() {
        None
    } else {
        Some(gp)
    }
}

/// Strategy/geography keywords present in the tokens.
#[must_use]
pub fn strategy_keywords(tokens: &[String]) -> BTreeSet<&'static str> {
    STRATEGY_KEYWORDS
        .iter()
        .copied()
        .filter(|kw| tokens.iter().any(|t| t.as_str() == *kw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(name: &NormalizedName) -> Vec<&str> {
        name.tokens.iter().map(String::as_str).collect()
    }

    #[test]
    fn strips_legal_suffixes_and_punctuation() {
        let n = normalize_name("KKR 2006 Fund, L.P.");
        assert_eq!(toks(&n), vec!["kkr", "2006", "fund"]);
        assert_eq!(n.sequence_number, None);

        let n = normalize_name("Ares Senior Direct Lending Fund SCSp");
        assert_eq!(toks(&n), vec!["ares", "senior", "direct", "lending", "fund"]);

        let n = normalize_name("Vista Equity Partners Fund VI-A, L.L.C.");
        assert_eq!(toks(&n), vec!["vista", "equity", "partners", "fund", "a"]);
        assert_eq!(n.sequence_number, Some(6));
    }

    #[test]
    fn same_tokens_regardless_of_suffix_form() {
        assert_eq!(
            normalize_name("Acme Growth Fund LP"),
            normalize_name("ACME  Growth Fund, L.P."),
        );
    }

    #[test]
    fn extracts_trailing_roman_sequence() {
        let n = normalize_name("Acme Partners IV");
        assert_eq!(toks(&n), vec!["acme", "partners"]);
        assert_eq!(n.sequence_number, Some(4));

        let n = normalize_name("Blackstone Capital Partners VII, L.P.");
        assert_eq!(n.sequence_number, Some(7));
    }

    #[test]
    fn sequence_before_vehicle_word_is_detected() {
        let a = normalize_name("KKR Americas XII Fund");
        let b = normalize_name("KKR Americas Fund XII");
        assert_eq!(a.sequence_number, Some(12));
        assert_eq!(b.sequence_number, Some(12));
        assert_eq!(a.sorted_key(), b.sorted_key());
    }

    #[test]
    fn numbered_marker_drops_no_prefix() {
        let n = normalize_name("Apollo Investment Fund No. IX");
        assert_eq!(toks(&n), vec!["apollo", "investment", "fund"]);
        assert_eq!(n.sequence_number, Some(9));

        let n = normalize_name("Sunrise Partners Fund 3");
        assert_eq!(n.sequence_number, Some(3));
    }

    #[test]
    fn years_are_not_sequence_numbers() {
        let n = normalize_name("Carlyle Partners 2019");
        assert_eq!(n.sequence_number, None);
        assert!(n.tokens.contains(&"2019".to_string()));
    }

    #[test]
    fn expands_abbreviations() {
        let n = normalize_name("Summit Cap Prtrs Fd");
        assert_eq!(toks(&n), vec!["summit", "capital", "partners", "fund"]);
    }

    #[test]
    fn empty_input_yields_empty_name() {
        let n = normalize_name("   ");
        assert!(n.is_empty());
        assert_eq!(n.sequence_number, None);
        assert!(normalize_gp_name("").is_none());
    }

    #[test]
    fn display_name_keeps_case_and_drops_suffix() {
        assert_eq!(display_name("KKR 2006 Fund, L.P."), "KKR 2006 Fund");
        assert_eq!(display_name("  Oak  Hill Capital Partners IV LLC "), "Oak Hill Capital Partners IV");
        assert_eq!(display_name("KKR & Co. L.P."), "KKR");
        assert_eq!(display_name("L.P."), "L.P.");
    }

    #[test]
    fn sequence_hint_only_fills_missing_marker() {
        let table = GpAliasTable::new();
        let hinted = RawFundRecord::new("Acme Growth Fund", "wsib").with_sequence_hint(2);
        assert_eq!(normalize_record(&hinted, &table).name.sequence_number, Some(2));

        let named = RawFundRecord::new("Acme Growth Fund III", "wsib").with_sequence_hint(2);
        assert_eq!(normalize_record(&named, &table).name.sequence_number, Some(3));
    }

    #[test]
    fn record_gp_uses_alias_table() {
        let mut table = GpAliasTable::new();
        table.insert("Kohlberg Kravis Roberts", "KKR").unwrap();

        let record = RawFundRecord::new("KKR 2006 Fund", "b").with_general_partner("KKR");
        let normalized = normalize_record(&record, &table);
        assert_eq!(normalized.gp_key.as_deref(), Some("kohlberg kravis roberts"));

        let blank = RawFundRecord::new("KKR 2006 Fund", "b").with_general_partner("  ");
        assert!(normalize_record(&blank, &table).gp_key.is_none());
    }

    #[test]
    fn low_distinctiveness_detection() {
        assert!(is_low_distinctiveness(&normalize_name("Capital Partners Fund II").tokens));
        assert!(!is_low_distinctiveness(&normalize_name("Riverside Capital Partners").tokens));
    }

    #[test]
    fn distinctive_overlap_ignores_generic_words() {
        let a = normalize_name("Northgate Capital Partners Growth Fund").tokens;
        let b = normalize_name("Northstar Capital Partners Growth Fund").tokens;
        assert_eq!(distinctive_overlap(&a, &b), Some(0.0));

        let c = normalize_name("Blue Ridge Capital Partners").tokens;
        let d = normalize_name("Blue Rock Capital").tokens;
        let overlap = distinctive_overlap(&c, &d).unwrap();
        assert!((overlap - 1.0 / 3.0).abs() < 1e-9);

        let generic = normalize_name("Capital Partners Fund").tokens;
        assert_eq!(distinctive_overlap(&a, &generic), None);
    }

    #[test]
    fn gp_is_read_off_fund_names() {
        assert_eq!(
            gp_from_fund_name("Blackstone Capital Partners VII (Cayman)").as_deref(),
            Some("Blackstone Capital Partners")
        );
        assert_eq!(gp_from_fund_name("Acme Partners IV").as_deref(), Some("Acme Partners"));
        assert_eq!(gp_from_fund_name("TPG Growth Fund III").as_deref(), Some("TPG Growth"));
        assert_eq!(gp_from_fund_name("Carlyle Partners 2019").as_deref(), Some("Carlyle Partners"));
        assert_eq!(gp_from_fund_name("Summit Growth Fund B").as_deref(), Some("Summit Growth Fund"));
        assert_eq!(gp_from_fund_name("Fund").as_deref(), Some("Fund"));
        assert_eq!(gp_from_fund_name("   "), None);
    }

    #[test]
    fn strategy_keywords_are_collected() {
        let n = normalize_name("Blackstone Real Estate Partners Europe V");
        let kws = strategy_keywords(&n.tokens);
        assert!(kws.contains("real"));
        assert!(kws.contains("europe"));
        assert!(!kws.contains("credit"));
    }
}
