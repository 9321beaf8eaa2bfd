/// Aggregate metrics and the numeric kernels behind them
///
/// Shared by the executor (aggregate / group_aggregate), the insight
/// generator and the data-quality detector, so every component computes
/// medians, quartiles and deviations the same way.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMetric {
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Median,
    StdDev,
}

impl AggregateMetric {
    /// Metric word as typed in a command
    pub fn from_word(word: &str) -> Option<Self> {
        let metric = match word {
            "count" | "number" | "frequency" => AggregateMetric::Count,
            "sum" | "total" => AggregateMetric::Sum,
            "average" | "avg" | "mean" => AggregateMetric::Mean,
            "min" | "minimum" | "lowest" | "smallest" => AggregateMetric::Min,
            "max" | "maximum" | "highest" | "largest" => AggregateMetric::Max,
            "median" => AggregateMetric::Median,
            "std" | "stddev" | "deviation" => AggregateMetric::StdDev,
            _ => return None,
        };
        Some(metric)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateMetric::Count => "count",
            AggregateMetric::Sum => "sum",
            AggregateMetric::Mean => "mean",
            AggregateMetric::Min => "min",
            AggregateMetric::Max => "max",
            AggregateMetric::Median => "median",
            AggregateMetric::StdDev => "std_dev",
        }
    }

    /// Every metric except Count reads numeric values
    pub fn needs_numeric(&self) -> bool {
        !matches!(self, AggregateMetric::Count)
    }

    /// Apply to already-extracted numeric values. None when undefined.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            AggregateMetric::Count => Some(values.len() as f64),
            AggregateMetric::Sum => {
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum())
                }
            }
            AggregateMetric::Mean => mean(values),
            AggregateMetric::Min => values.iter().copied().reduce(f64::min),
            AggregateMetric::Max => values.iter().copied().reduce(f64::max),
            AggregateMetric::Median => median(values),
            AggregateMetric::StdDev => sample_std_dev(values),
        }
    }
}

impl fmt::Display for AggregateMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Linear-interpolated quantile, `q` in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Lower and upper Tukey fences at `k` interquartile ranges
pub fn iqr_fences(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

/// Pearson correlation over paired values; None when either side is constant
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}
