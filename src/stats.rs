use serde::{Deserialize, Serialize};

/// Running mean and variance (Welford).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: if self.n_vals > 0 { self.mean } else { f64::NAN },
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Summary of the equilibrated tail of an adoption time series.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    /// Index where the equilibrated tail starts.
    pub i_equil: usize,
    /// Whether the chosen tail is longer than the last half of the series.
    pub is_equil: bool,
}

/// Report on the tail of `counts` chosen by the marginal standard error rule.
pub fn report_counts(counts: &[usize]) -> TimeSeriesReport {
    let i_equil = equil_index(counts);
    let tail = &counts[i_equil..];
    let acc = accumulate(tail.iter().map(|&count| count as f64));
    TimeSeriesReport {
        mean: acc.report().mean,
        std_dev: acc.report().std_dev,
        sem: blocking_sem(tail),
        i_equil,
        is_equil: !counts.is_empty() && i_equil != counts.len() / 2,
    }
}

fn accumulate(vals: impl Iterator<Item = f64>) -> Accumulator {
    let mut acc = Accumulator::new();
    vals.for_each(|val| acc.add(val));
    acc
}

fn sample_var(acc: &Accumulator) -> f64 {
    acc.report().std_dev.powi(2)
}

/// Standard error of the mean by Flyvbjerg-Petersen blocking.
///
/// Each level averages neighboring pairs of the previous one. The estimate is
/// taken at the first level that reaches the plateau of the later ones.
fn blocking_sem(counts: &[usize]) -> f64 {
    // (estimate, error) of the squared standard error per blocking level.
    let mut levels = Vec::new();
    let mut blk_vals: Vec<f64> = counts.iter().map(|&count| count as f64).collect();

    while blk_vals.len() >= 2 {
        let n_blks = blk_vals.len() as f64;
        let sem2 = sample_var(&accumulate(blk_vals.iter().copied())) / n_blks;
        levels.push((sem2, sem2 * (2.0 / (n_blks - 1.0)).sqrt()));

        blk_vals = blk_vals
            .chunks_exact(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect();
    }

    levels
        .iter()
        .enumerate()
        .find(|&(idx, &(sem2, _))| {
            let plateau = levels[idx..]
                .iter()
                .map(|&(later, err)| later - err)
                .fold(f64::NEG_INFINITY, f64::max);
            sem2 >= plateau
        })
        .map_or(f64::NAN, |(_, &(sem2, _))| sem2.sqrt())
}

/// Start of the tail minimizing the marginal standard error, among the
/// candidates 0, n/2^k, ..., n/4, n/2.
fn equil_index(counts: &[usize]) -> usize {
    let n_counts = counts.len();
    if n_counts < 2 {
        return 0;
    }

    let mut best = (f64::INFINITY, n_counts / 2);
    for i_equil in iter_candidates(n_counts, n_counts.ilog2()) {
        let tail = &counts[i_equil..];
        let n_tail = tail.len();
        if n_tail < 2 {
            continue;
        }

        let acc = accumulate(tail.iter().map(|&count| count as f64));
        let mse = sample_var(&acc) * (n_tail - 1) as f64 / n_tail.pow(2) as f64;
        if mse < best.0 {
            best = (mse, i_equil);
        }
    }
    best.1
}

fn iter_candidates(n_vals: usize, n_idxs: u32) -> impl Iterator<Item = usize> {
    (0..=n_idxs).map(move |idx| n_vals / 2_usize.pow(n_idxs + 1 - idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_mean_and_std_dev() {
        let mut acc = Accumulator::new();
        for val in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.add(val);
        }
        let report = acc.report();
        assert!((report.mean - 5.0).abs() < 1e-12);
        assert!((report.std_dev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn accumulator_with_few_values() {
        let acc = Accumulator::new();
        assert!(acc.report().mean.is_nan());

        let mut acc = Accumulator::new();
        acc.add(1.5);
        assert_eq!(acc.report().mean, 1.5);
        assert!(acc.report().std_dev.is_nan());
    }

    #[test]
    fn constant_series() {
        let report = report_counts(&[7; 256]);
        assert_eq!(report.mean, 7.0);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.sem, 0.0);
    }

    #[test]
    fn transient_is_discarded() {
        // A ramp followed by a long plateau.
        let counts: Vec<usize> = (0..1024).map(|i| if i < 100 { i } else { 100 }).collect();
        let report = report_counts(&counts);
        assert!(report.i_equil >= 100, "tail starts at {}", report.i_equil);
        assert_eq!(report.mean, 100.0);
        assert!(report.is_equil);
        assert!(counts.len() - report.i_equil > counts.len() / 2);
    }

    #[test]
    fn steady_drift_is_not_equilibrated() {
        let counts: Vec<usize> = (0..1024).collect();
        let report = report_counts(&counts);
        assert_eq!(report.i_equil, 512);
        assert!(!report.is_equil);
    }

    #[test]
    fn empty_series() {
        let report = report_counts(&[]);
        assert!(report.mean.is_nan());
        assert_eq!(report.i_equil, 0);
        assert!(!report.is_equil);
    }

    #[test]
    fn candidates_halve_the_series() {
        let candidates: Vec<usize> = iter_candidates(16, 16_usize.ilog2()).collect();
        assert_eq!(candidates, vec![0, 1, 2, 4, 8]);
    }
}
