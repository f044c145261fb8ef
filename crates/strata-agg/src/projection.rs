use crate::error::{AggError, AggResult};
use crate::report::GroupResult;

/// Pearson correlation from a population covariance and the two population variances.
///
/// `NaN` when either variance is zero (a constant variable has no defined correlation), and
/// whenever an input is already `NaN`.
pub fn correlation(covariance: f64, variance_a: f64, variance_b: f64) -> f64 {
    if variance_a == 0.0 || variance_b == 0.0 {
        return f64::NAN;
    }
    covariance / (variance_a.sqrt() * variance_b.sqrt())
}

/// A per-group derivation from statistics computed by earlier passes. Reads no records.
#[derive(Clone, Debug, PartialEq)]
pub enum Projection {
    Correlation {
        covariance: String,
        variance_a: String,
        variance_b: String,
        output: String,
    },
    StdDev {
        variance: String,
        output: String,
    },
}

impl Projection {
    pub fn correlation(
        output: impl Into<String>,
        covariance: impl Into<String>,
        variance_a: impl Into<String>,
        variance_b: impl Into<String>,
    ) -> Self {
        Self::Correlation {
            covariance: covariance.into(),
            variance_a: variance_a.into(),
            variance_b: variance_b.into(),
            output: output.into(),
        }
    }

    pub fn std_dev(output: impl Into<String>, variance: impl Into<String>) -> Self {
        Self::StdDev {
            variance: variance.into(),
            output: output.into(),
        }
    }

    pub fn output(&self) -> &str {
        match self {
            Self::Correlation { output, .. } | Self::StdDev { output, .. } => output,
        }
    }

    pub fn apply(&self, group: GroupResult) -> AggResult<GroupResult> {
        let input = |name: &str| {
            group
                .get(name)
                .ok_or_else(|| AggError::UnknownStatistic(name.to_string()))
        };
        let value = match self {
            Self::Correlation {
                covariance,
                variance_a,
                variance_b,
                ..
            } => correlation(input(covariance)?, input(variance_a)?, input(variance_b)?),
            Self::StdDev { variance, .. } => input(variance)?.sqrt(),
        };
        let output = self.output().to_string();
        Ok(group.with_stat(output, value))
    }
}
