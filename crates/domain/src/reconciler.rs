//! Product name reconciliation against the catalog.

use std::{cmp::Ordering, sync::Arc};

use async_trait::async_trait;
use order_store::LineItem;

use crate::{error::RejectReason, validator::RequestedLine};

/// Picks the catalog name closest to a free-text product mention.
#[async_trait]
pub trait Matcher: Send + Sync {
    /// Returns the best catalog name for `candidate`, or None if nothing is
    /// close enough.
    async fn best_match(&self, candidate: &str, catalog: &[String]) -> Option<String>;
}

/// Levenshtein similarity over normalized names.
///
/// Similarity is `1 - distance / longer_length`. Ties go to the shorter
/// catalog name, then to the lexicographically smaller one.
#[derive(Debug, Clone, Copy)]
pub struct EditDistanceMatcher {
    min_similarity: f64,
}

impl EditDistanceMatcher {
    pub const DEFAULT_MIN_SIMILARITY: f64 = 0.5;

    /// Creates a matcher that rejects candidates below `min_similarity`.
    pub fn new(min_similarity: f64) -> Self {
        Self {
            min_similarity: min_similarity.clamp(0.0, 1.0),
        }
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    /// Scores every catalog name and returns the winner with its score.
    pub fn rank<'a>(&self, candidate: &str, catalog: &'a [String]) -> Option<(&'a str, f64)> {
        let wanted = normalize(candidate);
        if wanted.is_empty() {
            return None;
        }

        catalog
            .iter()
            .map(|name| (name.as_str(), similarity(&wanted, &normalize(name))))
            .filter(|(_, score)| *score >= self.min_similarity)
            .min_by(|(a_name, a_score), (b_name, b_score)| {
                b_score
                    .partial_cmp(a_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a_name.chars().count().cmp(&b_name.chars().count()))
                    .then_with(|| a_name.cmp(b_name))
            })
    }
}

impl Default for EditDistanceMatcher {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_SIMILARITY)
    }
}

#[async_trait]
impl Matcher for EditDistanceMatcher {
    async fn best_match(&self, candidate: &str, catalog: &[String]) -> Option<String> {
        self.rank(candidate, catalog)
            .map(|(name, _)| name.to_string())
    }
}

/// Lowercases, keeps letters, digits and single spaces.
pub fn normalize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit distance counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

/// Similarity in `[0, 1]` of two already-normalized names.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Maps free-text lines onto canonical catalog names.
///
/// Output has the same length and order as the input, with quantities
/// carried over unchanged.
#[derive(Clone)]
pub struct ProductNameReconciler {
    matcher: Arc<dyn Matcher>,
}

impl ProductNameReconciler {
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self { matcher }
    }

    /// Reconciler backed by [`EditDistanceMatcher`].
    pub fn with_edit_distance(min_similarity: f64) -> Self {
        Self::new(Arc::new(EditDistanceMatcher::new(min_similarity)))
    }

    /// Reconciles every line or rejects the whole order.
    #[tracing::instrument(skip(self, catalog, lines), fields(lines = lines.len()))]
    pub async fn reconcile(
        &self,
        catalog: &[String],
        lines: &[RequestedLine],
    ) -> Result<Vec<LineItem>, RejectReason> {
        let mut reconciled = Vec::with_capacity(lines.len());
        let mut unknown = Vec::new();

        for line in lines {
            match self.resolve(&line.product, catalog).await {
                Some(name) => reconciled.push(LineItem::new(name, line.quantity)),
                None => unknown.push(line.product.clone()),
            }
        }

        if !unknown.is_empty() {
            tracing::debug!(?unknown, "Products not found in catalog");
            return Err(RejectReason::UnknownProducts(unknown));
        }

        Ok(reconciled)
    }

    async fn resolve(&self, product: &str, catalog: &[String]) -> Option<String> {
        if catalog.iter().any(|name| name == product) {
            return Some(product.to_string());
        }

        let matched = self.matcher.best_match(product, catalog).await?;
        if catalog.contains(&matched) {
            if matched != product {
                tracing::debug!(from = %product, to = %matched, "Reconciled product name");
            }
            Some(matched)
        } else {
            None
        }
    }
}

impl Default for ProductNameReconciler {
    fn default() -> Self {
        Self::new(Arc::new(EditDistanceMatcher::default()))
    }
}

impl std::fmt::Debug for ProductNameReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductNameReconciler").finish_non_exhaustive()
    }
}
