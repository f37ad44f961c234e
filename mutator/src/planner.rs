//! Choosing which single site to mutate.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::Category;
use crate::error::{Error, Result};

/// Relative weight of each category when drawing a plan. Weights are
/// renormalized over the categories that have at least one site.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryWeights {
    pub comparison: f64,
    pub binary_operator: f64,
    pub deletable_statement: f64,
    pub boolean_literal_test: f64,
    pub call_name_swap: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            comparison: 0.44,
            binary_operator: 0.44,
            deletable_statement: 0.04,
            boolean_literal_test: 0.04,
            call_name_swap: 0.04,
        }
    }
}

impl CategoryWeights {
    pub fn from_toml(s: &str) -> Result<Self> {
        let weights: Self = toml::from_str(s)?;
        weights.validate()?;
        Ok(weights)
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Comparison => self.comparison,
            Category::BinaryOperator => self.binary_operator,
            Category::DeletableStatement => self.deletable_statement,
            Category::BooleanLiteralTest => self.boolean_literal_test,
            Category::CallNameSwap => self.call_name_swap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            let w = self.get(category);
            if !w.is_finite() || w < 0.0 {
                return Err(Error::Config(format!(
                    "weight for {category} must be a non-negative number, got {w}"
                )));
            }
        }
        Ok(())
    }
}

/// Which ordinal sites to edit, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    picks: BTreeMap<Category, BTreeSet<usize>>,
}

impl MutationPlan {
    pub fn single(category: Category, index: usize) -> Self {
        let mut picks = BTreeMap::new();
        picks.insert(category, BTreeSet::from([index]));
        Self { picks }
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn selects(&self, category: Category, index: usize) -> bool {
        self.picks.get(&category).is_some_and(|s| s.contains(&index))
    }

    pub fn picks(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.picks.iter().flat_map(|(c, idxs)| idxs.iter().map(move |i| (*c, *i)))
    }
}

/// Draw one category (weighted) and one index within it (uniform).
/// Returns an empty plan when every count is zero.
pub fn choose_plan<R: Rng + ?Sized>(
    counts: &[(Category, usize)],
    weights: &CategoryWeights,
    rng: &mut R,
) -> MutationPlan {
    let available: Vec<(Category, usize)> = counts.iter().copied().filter(|(_, n)| *n > 0).collect();
    if available.is_empty() {
        return MutationPlan::default();
    }

    let &(category, count) = available
        .choose_weighted(rng, |(c, _)| weights.get(*c))
        .unwrap_or_else(|_| {
            // every available weight is zero
            available.choose(rng).unwrap_or(&available[0])
        });
    let index = rng.random_range(0..count);
    debug!("planned {category} site {index} of {count}");
    MutationPlan::single(category, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn counts(cmp: usize, bin: usize, del: usize, bool_: usize, call: usize) -> Vec<(Category, usize)> {
        vec![
            (Category::Comparison, cmp),
            (Category::BinaryOperator, bin),
            (Category::DeletableStatement, del),
            (Category::BooleanLiteralTest, bool_),
            (Category::CallNameSwap, call),
        ]
    }

    #[test]
    fn test_empty_counts_give_empty_plan() {
        let mut rng = StdRng::seed_from_u64(0);
        let plan = choose_plan(&counts(0, 0, 0, 0, 0), &CategoryWeights::default(), &mut rng);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_only_available_category_is_chosen() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = choose_plan(&counts(0, 0, 0, 3, 0), &CategoryWeights::default(), &mut rng);
            let picks: Vec<_> = plan.picks().collect();
            assert_eq!(picks.len(), 1);
            assert_eq!(picks[0].0, Category::BooleanLiteralTest);
            assert!(picks[0].1 < 3);
        }
    }

    #[test]
    fn test_same_seed_same_plan() {
        let c = counts(4, 7, 2, 1, 1);
        let a = choose_plan(&c, &CategoryWeights::default(), &mut StdRng::seed_from_u64(9));
        let b = choose_plan(&c, &CategoryWeights::default(), &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_weights_bias_toward_comparisons_and_binops() {
        let c = counts(5, 5, 5, 5, 5);
        let mut rng = StdRng::seed_from_u64(1234);
        let mut dominant = 0;
        for _ in 0..2000 {
            let plan = choose_plan(&c, &CategoryWeights::default(), &mut rng);
            let (cat, _) = plan.picks().next().unwrap();
            if matches!(cat, Category::Comparison | Category::BinaryOperator) {
                dominant += 1;
            }
        }
        // expected share is 0.88
        assert!(dominant > 1600 && dominant < 1900, "{dominant}");
    }

    #[test]
    fn test_zero_weights_fall_back_to_uniform() {
        let weights = CategoryWeights {
            comparison: 0.0,
            binary_operator: 0.0,
            deletable_statement: 0.0,
            boolean_literal_test: 0.0,
            call_name_swap: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let plan = choose_plan(&counts(2, 2, 0, 0, 0), &weights, &mut rng);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_zero_weight_category_is_never_drawn() {
        let weights = CategoryWeights { comparison: 0.0, ..CategoryWeights::default() };
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let plan = choose_plan(&counts(3, 3, 0, 0, 0), &weights, &mut rng);
            assert!(plan.selects(Category::BinaryOperator, plan.picks().next().unwrap().1));
        }
    }

    #[test]
    fn test_weights_from_toml() {
        let w = CategoryWeights::from_toml("comparison = 0.5\ncall_name_swap = 0.1\n").unwrap();
        assert_eq!(w.comparison, 0.5);
        assert_eq!(w.call_name_swap, 0.1);
        assert_eq!(w.binary_operator, 0.44);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let err = CategoryWeights::from_toml("comparison = -1.0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_unknown_weight_key_is_rejected() {
        assert!(CategoryWeights::from_toml("comparisons = 1.0\n").is_err());
    }
}
