use crate::{error::Error, Result};

/// Thresholds used across the pipeline stages
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Minimum deletions in the bisulfite sample
    pub min_bs_del: u32,
    /// Minimum coverage in the bisulfite sample
    pub min_bs_cov: u32,
    /// Minimum deletion fraction in the bisulfite sample
    pub min_bs_frac: f64,
    /// Minimum coverage in the non-bisulfite sample
    pub min_nbs_cov: u32,
    /// Maximum deletion fraction in the non-bisulfite sample
    pub max_nbs_frac: f64,
    /// Window length used for homopolymer and downstream base checks
    pub hp_length: usize,
    /// Background deletion rate of the binomial test
    pub error_rate: f64,
    /// Significance cutoff for both samples
    pub pval: f64,
    /// Fraction of the group maximum below which a group is split
    pub split_thresh: f64,
    /// Distance to a non-bisulfite deletion that marks a group as background
    pub del_distance: u64,
    /// Half width of the windows around exon boundaries
    pub flank_length: u64,
    /// Whether a non-bisulfite control sample is part of the run
    pub has_control: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_bs_del: 5,
            min_bs_cov: 10,
            min_bs_frac: 0.005,
            min_nbs_cov: 10,
            max_nbs_frac: 0.01,
            hp_length: 6,
            error_rate: 0.001,
            pval: 0.05,
            split_thresh: 0.5,
            del_distance: 5,
            flank_length: 4,
            has_control: true,
        }
    }
}

impl Config {
    /// Rejects settings the statistics or the sequence scans cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.error_rate > 0.0 && self.error_rate < 1.0) {
            return Err(Error::ConfigError(format!(
                "error rate must be between 0 and 1 (exclusive), got {}",
                self.error_rate
            )));
        }
        for (name, value) in [
            ("p-value", self.pval),
            ("split threshold", self.split_thresh),
            ("min bisulfite fraction", self.min_bs_frac),
            ("max non-bisulfite fraction", self.max_nbs_frac),
        ]
        .iter()
        {
            if !(0.0..=1.0).contains(value) {
                return Err(Error::ConfigError(format!(
                    "{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }
        if self.hp_length == 0 {
            return Err(Error::ConfigError(
                "homopolymer length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
