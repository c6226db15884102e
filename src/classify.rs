//! Keyword classification of asset class and sub-strategy.
//!
//! Used to seed descriptive fields on newly created funds. Rules are checked
//! most specific first; the first hit wins.

/// Asset class and optional sub-strategy inferred from a fund name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyClass {
    /// Broad asset class, e.g. "Private Equity".
    pub asset_class: &'static str,
    /// Strategy within the asset class, if recognized.
    pub sub_strategy: Option<&'static str>,
}

const PRIVATE_EQUITY: &str = "Private Equity";
const REAL_ASSETS: &str = "Real Assets";
const PRIVATE_CREDIT: &str = "Private Credit";

struct Rule {
    keywords: &'static [&'static str],
    asset_class: &'static str,
    sub_strategy: &'static str,
}

const RULES: &[Rule] = &[
    Rule { keywords: &["real estate", "realty", "property", "reit"], asset_class: REAL_ASSETS, sub_strategy: "Real Estate" },
    Rule { keywords: &["infrastructure", "infra "], asset_class: REAL_ASSETS, sub_strategy: "Infrastructure" },
    Rule { keywords: &["natural resource", "timber", "mining", "oil ", "gas "], asset_class: REAL_ASSETS, sub_strategy: "Natural Resources" },
    Rule { keywords: &["energy"], asset_class: PRIVATE_EQUITY, sub_strategy: "Energy" },
    Rule { keywords: &["fund of funds", "pathway"], asset_class: PRIVATE_EQUITY, sub_strategy: "Fund of Funds" },
    Rule { keywords: &["secondar"], asset_class: PRIVATE_EQUITY, sub_strategy: "Secondaries" },
    Rule { keywords: &["co-invest", "coinvest", "co invest"], asset_class: PRIVATE_EQUITY, sub_strategy: "Co-Investment" },
    Rule { keywords: &["credit", "debt", "loan", "lending", "mezzanine", "mezz"], asset_class: PRIVATE_CREDIT, sub_strategy: "Credit" },
    Rule { keywords: &["distress", "special situation", "turnaround", "recovery", "rescue"], asset_class: PRIVATE_EQUITY, sub_strategy: "Distressed/Special Situations" },
    Rule { keywords: &["venture", "seed", "early stage", "early-stage"], asset_class: PRIVATE_EQUITY, sub_strategy: "Venture Capital" },
    Rule { keywords: &["growth"], asset_class: PRIVATE_EQUITY, sub_strategy: "Growth Equity" },
    Rule { keywords: &["buyout"], asset_class: PRIVATE_EQUITY, sub_strategy: "Buyout" },
    Rule { keywords: &["opportunit"], asset_class: PRIVATE_EQUITY, sub_strategy: "Opportunistic" },
];

/// Classifies a raw or normalized fund name.
///
/// Names with no recognizable keyword default to private equity with no
/// sub-strategy.
///
/// # Examples
///
/// ```
/// use fundlink::classify::classify_strategy;
///
/// let class = classify_strategy("Blackstone Real Estate Partners IX");
/// assert_eq!(class.asset_class, "Real Assets");
/// assert_eq!(class.sub_strategy, Some("Real Estate"));
/// ```
#[must_use]
pub fn classify_strategy(fund_name: &str) -> StrategyClass {
    let lower = format!("{} ", fund_name.to_lowercase());
    RULES
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| lower.contains(kw)))
        .map_or(
            StrategyClass {
                asset_class: PRIVATE_EQUITY,
                sub_strategy: None,
            },
            |rule| StrategyClass {
                asset_class: rule.asset_class,
                sub_strategy: Some(rule.sub_strategy),
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specific_rules_win_over_general() {
        // "credit" would also match, but infrastructure is checked first.
        let c = classify_strategy("Global Infrastructure Credit Partners");
        assert_eq!(c.sub_strategy, Some("Infrastructure"));
    }

    #[test]
    fn trailing_keyword_with_space_matches() {
        let c = classify_strategy("EnCap Oil");
        assert_eq!(c.sub_strategy, Some("Natural Resources"));
    }

    #[test]
    fn credit_is_its_own_asset_class() {
        let c = classify_strategy("Ares Senior Direct Lending Fund");
        assert_eq!(c.asset_class, "Private Credit");
    }

    #[test]
    fn unknown_defaults_to_private_equity() {
        let c = classify_strategy("Blackstone Capital Partners VII");
        assert_eq!(c.asset_class, "Private Equity");
        assert_eq!(c.sub_strategy, None);
        assert_eq!(classify_strategy("").sub_strategy, None);
    }
}
