use crate::error::Error;
use crate::Result;
use statrs::distribution::{Binomial, DiscreteCDF};

/// q-values below this are reported as `OK`
pub const QVALUE_CUTOFF: f64 = 0.05;

/// One-sided binomial test, `P(X >= deletions)` for `depth` trials at `error_rate`
pub fn binomial_pval(depth: u32, deletions: u32, error_rate: f64) -> Result<f64> {
    if deletions > depth {
        return Err(Error::InvalidCounts { deletions, depth });
    }
    if deletions == 0 {
        return Ok(1.0);
    }
    let binomial = Binomial::new(error_rate, depth as u64)
        .map_err(|e| Error::StatisticsError(e.to_string()))?;
    let pval = binomial.sf(deletions as u64 - 1);
    Ok(pval.max(0.0).min(1.0))
}

/// Adjusts p-values that are sorted in descending order.
///
/// The first (largest) p-value is left as is. Every following value is scaled by
/// `n / (n - i)` and capped by the running minimum of the adjusted values, which
/// starts at 1. Unlike the textbook Benjamini-Hochberg step-up procedure the
/// scale uses the index in descending order.
pub fn bh_adjust_descending(sorted_desc: &[f64]) -> Vec<f64> {
    let n = sorted_desc.len() as f64;
    let mut prior = 1.0;
    sorted_desc
        .iter()
        .enumerate()
        .map(|(i, &pval)| {
            if i == 0 {
                return pval;
            }
            let adjusted = pval * n / (n - i as f64);
            if adjusted < prior {
                prior = adjusted;
                adjusted
            } else {
                prior
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn binomial_tail() {
        // P(X >= 1) = 1 - (1 - p)^n
        let pval = binomial_pval(10, 1, 0.1).unwrap();
        assert!(approx(pval, 1.0 - 0.9f64.powi(10)));

        // P(X >= n) = p^n
        let pval = binomial_pval(3, 3, 0.5).unwrap();
        assert!(approx(pval, 0.125));
    }

    #[test]
    fn binomial_without_deletions() {
        assert_eq!(binomial_pval(0, 0, 0.001).unwrap(), 1.0);
        assert_eq!(binomial_pval(50, 0, 0.001).unwrap(), 1.0);
    }

    #[test]
    fn binomial_rejects_impossible_counts() {
        assert!(matches!(
            binomial_pval(5, 6, 0.001),
            Err(Error::InvalidCounts { .. })
        ));
    }

    #[test]
    fn strong_signal_is_significant() {
        let pval = binomial_pval(20, 10, 0.001).unwrap();
        assert!(pval < 1e-20);
        assert!(pval >= 0.0);
    }

    #[test]
    fn descending_adjustment_matches_literal_procedure() {
        // Intentionally not the textbook procedure: index scaled from the largest value
        let adjusted = bh_adjust_descending(&[0.9, 0.04, 0.02, 0.001]);
        assert!(approx(adjusted[0], 0.9));
        assert!(approx(adjusted[1], 0.04 * 4.0 / 3.0));
        assert!(approx(adjusted[2], 0.02 * 4.0 / 2.0));
        assert!(approx(adjusted[3], 0.001 * 4.0));
    }

    #[test]
    fn descending_adjustment_is_monotone() {
        let pvals = [0.8, 0.7, 0.5, 0.45, 0.2, 0.19, 0.01, 0.001];
        let adjusted = bh_adjust_descending(&pvals);
        for pair in adjusted[1..].windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert!(adjusted.iter().all(|q| (0.0..=1.0).contains(q)));
    }

    #[test]
    fn descending_adjustment_clamps_to_running_minimum() {
        let adjusted = bh_adjust_descending(&[0.5, 0.4, 0.39]);
        // 0.4 * 3 / 2 = 0.6, 0.39 * 3 = 1.17 capped at 0.6
        assert!(approx(adjusted[1], 0.6));
        assert!(approx(adjusted[2], 0.6));
    }

    #[test]
    fn empty_and_single() {
        assert!(bh_adjust_descending(&[]).is_empty());
        assert_eq!(bh_adjust_descending(&[0.3]), vec![0.3]);
    }
}
