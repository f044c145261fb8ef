use crate::extractor::Extractor;

/// Running state of one statistic over one group.
///
/// States are plain values: [`Accumulator::fold`] and [`Accumulator::merge`] return the next state
/// instead of mutating in place. Count, sum and sum of squared deviations are all associative, so
/// partial states built over disjoint chunks of a group can be merged in any grouping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Accumulator {
    Count { n: u64 },
    Average { sum: f64, n: u64 },
    /// Population variance around a mean fixed before the fold starts.
    Variance { mean: f64, sum_sq: f64, n: u64 },
}

impl Accumulator {
    pub const fn count() -> Self {
        Self::Count { n: 0 }
    }

    pub const fn average() -> Self {
        Self::Average { sum: 0.0, n: 0 }
    }

    pub const fn variance(mean: f64) -> Self {
        Self::Variance {
            mean,
            sum_sq: 0.0,
            n: 0,
        }
    }

    #[must_use]
    pub fn fold(self, x: f64) -> Self {
        match self {
            Self::Count { n } => Self::Count { n: n + 1 },
            Self::Average { sum, n } => Self::Average {
                sum: sum + x,
                n: n + 1,
            },
            Self::Variance { mean, sum_sq, n } => {
                let d = x - mean;
                Self::Variance {
                    mean,
                    sum_sq: sum_sq + d * d,
                    n: n + 1,
                }
            }
        }
    }

    /// Combine two states of the same kind built over disjoint record sets.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Count { n: a }, Self::Count { n: b }) => Self::Count { n: a + b },
            (Self::Average { sum: sa, n: na }, Self::Average { sum: sb, n: nb }) => {
                Self::Average {
                    sum: sa + sb,
                    n: na + nb,
                }
            }
            (
                Self::Variance {
                    mean,
                    sum_sq: sa,
                    n: na,
                },
                Self::Variance {
                    mean: other_mean,
                    sum_sq: sb,
                    n: nb,
                },
            ) => {
                debug_assert!(
                    mean.to_bits() == other_mean.to_bits(),
                    "variance states must share their mean"
                );
                Self::Variance {
                    mean,
                    sum_sq: sa + sb,
                    n: na + nb,
                }
            }
            (a, b) => unreachable!("cannot merge {a:?} with {b:?}"),
        }
    }

    /// Number of records folded so far.
    pub fn folded(&self) -> u64 {
        match self {
            Self::Count { n } | Self::Average { n, .. } | Self::Variance { n, .. } => *n,
        }
    }

    /// Final value of the statistic. Averages and variances over zero records are `NaN`.
    pub fn finalize(&self) -> f64 {
        match *self {
            Self::Count { n } => n as f64,
            Self::Average { n: 0, .. } | Self::Variance { n: 0, .. } => f64::NAN,
            Self::Average { sum, n } => sum / n as f64,
            Self::Variance { sum_sq, n, .. } => sum_sq / n as f64,
        }
    }
}

/// What a named statistic computes.
#[derive(Clone, Debug, PartialEq)]
pub enum Statistic {
    Count,
    Average(Extractor),
    Variance { extractor: Extractor, mean: f64 },
}

impl Statistic {
    pub fn identity(&self) -> Accumulator {
        match self {
            Self::Count => Accumulator::count(),
            Self::Average(_) => Accumulator::average(),
            Self::Variance { mean, .. } => Accumulator::variance(*mean),
        }
    }

    pub fn extractor(&self) -> Option<&Extractor> {
        match self {
            Self::Count => None,
            Self::Average(extractor) | Self::Variance { extractor, .. } => Some(extractor),
        }
    }
}

/// One output field of a pass: the field name and the statistic that fills it.
#[derive(Clone, Debug, PartialEq)]
pub struct StatSpec {
    pub name: String,
    pub statistic: Statistic,
}

impl StatSpec {
    pub fn new(name: impl Into<String>, statistic: Statistic) -> Self {
        Self {
            name: name.into(),
            statistic,
        }
    }

    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name, Statistic::Count)
    }

    pub fn average(name: impl Into<String>, extractor: Extractor) -> Self {
        Self::new(name, Statistic::Average(extractor))
    }

    pub fn variance(name: impl Into<String>, extractor: Extractor, mean: f64) -> Self {
        Self::new(name, Statistic::Variance { extractor, mean })
    }

    /// Population covariance of `a` and `b` given their means: the average of
    /// `(a - mean_a) * (b - mean_b)`.
    pub fn covariance(
        name: impl Into<String>,
        a: Extractor,
        mean_a: f64,
        b: Extractor,
        mean_b: f64,
    ) -> Self {
        let product = (a - Extractor::constant(mean_a)) * (b - Extractor::constant(mean_b));
        Self::average(name, product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold_all(acc: Accumulator, values: &[f64]) -> Accumulator {
        values.iter().fold(acc, |acc, &x| acc.fold(x))
    }

    #[test]
    fn identities_finalize_to_zero_or_nan() {
        assert_eq!(Accumulator::count().finalize(), 0.0);
        assert!(Accumulator::average().finalize().is_nan());
        assert!(Accumulator::variance(3.0).finalize().is_nan());
    }

    #[test]
    fn population_variance_uses_n_as_divisor() {
        let values = [10.0, 20.0, 30.0];
        let mean = fold_all(Accumulator::average(), &values);
        assert_eq!(mean.finalize(), 20.0);

        let variance = fold_all(Accumulator::variance(20.0), &values);
        assert_eq!(variance.folded(), 3);
        assert!((variance.finalize() - 200.0 / 3.0).abs() < 1e-12);

        let constant = fold_all(Accumulator::variance(5.0), &[5.0, 5.0, 5.0]);
        assert_eq!(constant.finalize(), 0.0);
    }

    #[test]
    fn merging_chunks_matches_a_single_fold() {
        let values = [1.0, 2.0, 4.0, 8.0, 16.0];
        for identity in [
            Accumulator::count(),
            Accumulator::average(),
            Accumulator::variance(6.2),
        ] {
            let whole = fold_all(identity, &values);
            let merged = fold_all(identity, &values[..2]).merge(fold_all(identity, &values[2..]));
            assert_eq!(whole.folded(), merged.folded());
            assert!((whole.finalize() - merged.finalize()).abs() < 1e-12);
        }
    }

    #[test]
    fn count_ignores_the_value() {
        let n = fold_all(Accumulator::count(), &[f64::NAN, 1.0]);
        assert_eq!(n, Accumulator::Count { n: 2 });
    }

    #[test]
    fn covariance_is_an_average_of_centred_products() {
        let spec = StatSpec::covariance("cov", Extractor::field("x"), 1.5, Extractor::field("y"), 2.0);
        let Statistic::Average(product) = &spec.statistic else {
            panic!("covariance should be an average, got {:?}", spec.statistic);
        };
        assert_eq!(product.fields(), vec!["x", "y"]);
        assert_eq!(spec.statistic.identity(), Accumulator::average());
    }
}
