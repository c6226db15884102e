//! Inverted index used to build bounded candidate pools.
//!
//! Only distinctive tokens get postings. Generic words ("fund", "capital",
//! "partners") appear in nearly every name and would turn each pool into the
//! whole registry. A name made only of generic words is posted under all of
//! its tokens, so such names still find each other.

use std::collections::{BTreeSet, HashMap};

use crate::fund::CanonicalFund;
use crate::normalize::is_generic_token;

/// Tokens a name is posted and looked up under.
fn index_terms(tokens: &[String]) -> impl Iterator<Item = &String> {
    let distinctive = tokens.iter().any(|t| !is_generic_token(t));
    tokens
        .iter()
        .filter(move |t| !distinctive || !is_generic_token(t.as_str()))
}

/// Token and GP postings keyed by fund ordinal (creation order).
#[derive(Debug, Clone, Default)]
pub(crate) struct CandidateIndex {
    by_token: HashMap<String, BTreeSet<usize>>,
    by_gp: HashMap<String, BTreeSet<usize>>,
}

impl CandidateIndex {
    pub(crate) fn insert_fund(&mut self, ordinal: usize, fund: &CanonicalFund) {
        for token in index_terms(&fund.name_tokens) {
            self.by_token.entry(token.clone()).or_default().insert(ordinal);
        }
        if let Some(gp) = fund.general_partner_key.as_deref() {
            self.add_gp(ordinal, gp);
        }
    }

    pub(crate) fn add_gp(&mut self, ordinal: usize, gp_key: &str) {
        self.by_gp.entry(gp_key.to_string()).or_default().insert(ordinal);
    }

    pub(crate) fn remove_gp(&mut self, ordinal: usize, gp_key: &str) {
        if let Some(postings) = self.by_gp.get_mut(gp_key) {
            postings.remove(&ordinal);
            if postings.is_empty() {
                self.by_gp.remove(gp_key);
            }
        }
    }

    /// Funds sharing an index term or the GP key, in creation order.
    pub(crate) fn candidates(&self, tokens: &[String], gp_key: Option<&str>) -> BTreeSet<usize> {
        let mut pool = BTreeSet::new();
        for token in index_terms(tokens) {
            if let Some(postings) = self.by_token.get(token) {
                pool.extend(postings.iter().copied());
            }
        }
        if let Some(postings) = gp_key.and_then(|gp| self.by_gp.get(gp)) {
            pool.extend(postings.iter().copied());
        }
        pool
    }
}
