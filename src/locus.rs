use crate::config::Config;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Per coordinate deletion summary of the bisulfite and non-bisulfite samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocusObservation {
    /// Chromosome name
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    /// Deletions in the bisulfite sample
    pub bs_del: u32,
    /// Coverage in the bisulfite sample
    pub bs_cov: u32,
    /// Deletions in the non-bisulfite sample
    pub nbs_del: u32,
    /// Coverage in the non-bisulfite sample
    pub nbs_cov: u32,
    /// Reads aligned to the forward strand
    pub forward: u32,
    /// Reads aligned to the reverse strand
    pub reverse: u32,
}

impl LocusObservation {
    /// Deletion fraction of the bisulfite sample, 0 without coverage
    pub fn bs_frac(&self) -> f64 {
        fraction(self.bs_del, self.bs_cov)
    }

    /// Deletion fraction of the non-bisulfite sample, 0 without coverage
    pub fn nbs_frac(&self) -> f64 {
        fraction(self.nbs_del, self.nbs_cov)
    }

    /// Same locus with the non-bisulfite counts zeroed
    pub fn without_control(mut self) -> Self {
        self.nbs_del = 0;
        self.nbs_cov = 0;
        self
    }

    /// Audit representation, readable again as a parsed table line
    pub fn audit_row(&self, verdict: &Verdict) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.pos,
            self.bs_del,
            self.bs_cov,
            self.nbs_del,
            self.nbs_cov,
            self.forward,
            self.reverse,
            verdict
        )
    }
}

fn fraction(del: u32, cov: u32) -> f64 {
    if cov == 0 {
        0.0
    } else {
        del as f64 / cov as f64
    }
}

/// Strand call made from the forward/reverse read tallies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    /// Clear forward majority
    Forward,
    /// Forward majority below twice the reverse fraction
    AmbiguousForward,
    /// Clear reverse majority
    Reverse,
    /// Reverse majority below twice the forward fraction
    AmbiguousReverse,
    /// No reads to call from
    Unknown,
}

/// Strand ignoring the ambiguity mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `+`
    Plus,
    /// `-`
    Minus,
}

impl Strand {
    /// Majority call, ties go to the reverse strand
    pub fn call(forward: u32, reverse: u32) -> Self {
        let total = forward as f64 + reverse as f64;
        if total == 0.0 {
            return Strand::Unknown;
        }
        let per_f = forward as f64 / total;
        let per_r = reverse as f64 / total;

        if per_f > per_r {
            if per_f < per_r * 2.0 {
                Strand::AmbiguousForward
            } else {
                Strand::Forward
            }
        } else if per_r < per_f * 2.0 {
            Strand::AmbiguousReverse
        } else {
            Strand::Reverse
        }
    }

    /// `NA` is resolved like the reverse strand
    pub fn direction(&self) -> Direction {
        match self {
            Strand::Forward | Strand::AmbiguousForward => Direction::Plus,
            _ => Direction::Minus,
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strand = match self {
            Strand::Forward => "+",
            Strand::AmbiguousForward => "+*",
            Strand::Reverse => "-",
            Strand::AmbiguousReverse => "-*",
            Strand::Unknown => "NA",
        };
        write!(f, "{}", strand)
    }
}

/// Threshold a locus failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterReason {
    /// Too few deletions in the bisulfite sample
    MinDelBs,
    /// Deletion fraction too low in the bisulfite sample
    MinBsFrac,
    /// Coverage too low in the bisulfite sample
    MinBsCov,
    /// Deletion fraction too high in the non-bisulfite sample
    MaxNbsFrac,
    /// Coverage too low in the non-bisulfite sample
    MinNbsCov,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FilterReason::MinDelBs => "minDelBs",
            FilterReason::MinBsFrac => "minBsFrac",
            FilterReason::MinBsCov => "minBsCov",
            FilterReason::MaxNbsFrac => "minNbsFrac",
            FilterReason::MinNbsCov => "minNbsCov",
        };
        write!(f, "{}", reason)
    }
}

/// Outcome of filtering a single locus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All thresholds cleared
    Passed,
    /// Failed thresholds in check order
    Failed(Vec<FilterReason>),
}

impl Verdict {
    /// Locus can be grouped
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Failed(reasons) => {
                for reason in reasons {
                    write!(f, "{};", reason)?;
                }
                Ok(())
            }
        }
    }
}

/// Non-bisulfite deletion sites, 0-based, queried by the proximity pass
#[derive(Debug, Default, Clone)]
pub struct BackgroundSites(HashMap<String, BTreeSet<u64>>);

impl BackgroundSites {
    /// Records a site
    pub fn insert(&mut self, chrom: &str, pos: u64) {
        self.0.entry(chrom.to_string()).or_default().insert(pos);
    }

    /// Checks for any site within `distance` of `pos`, both ends inclusive
    pub fn any_within(&self, chrom: &str, pos: u64, distance: u64) -> bool {
        match self.0.get(chrom) {
            Some(sites) => sites
                .range(pos.saturating_sub(distance)..=pos.saturating_add(distance))
                .next()
                .is_some(),
            None => false,
        }
    }

    /// Total number of recorded sites
    pub fn len(&self) -> usize {
        self.0.values().map(|sites| sites.len()).sum()
    }

    /// No sites recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Running tallies of the threshold filtering
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilterCounts {
    /// Loci seen
    pub total: usize,
    /// Loci passing every threshold
    pub passed: usize,
    /// Too few bisulfite deletions
    pub min_del_bs: usize,
    /// Bisulfite fraction too low
    pub min_bs_frac: usize,
    /// Bisulfite coverage too low
    pub min_bs_cov: usize,
    /// Non-bisulfite fraction too high
    pub max_nbs_frac: usize,
    /// Non-bisulfite coverage too low
    pub min_nbs_cov: usize,
}

impl FilterCounts {
    fn record(&mut self, verdict: &Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Failed(reasons) => {
                for reason in reasons {
                    match reason {
                        FilterReason::MinDelBs => self.min_del_bs += 1,
                        FilterReason::MinBsFrac => self.min_bs_frac += 1,
                        FilterReason::MinBsCov => self.min_bs_cov += 1,
                        FilterReason::MaxNbsFrac => self.max_nbs_frac += 1,
                        FilterReason::MinNbsCov => self.min_nbs_cov += 1,
                    }
                }
            }
        }
    }
}

/// Applies the coverage and fraction thresholds to each incoming locus
#[derive(Debug)]
pub struct LocusFilter<'a> {
    config: &'a Config,
    background: BackgroundSites,
    counts: FilterCounts,
}

impl<'a> LocusFilter<'a> {
    /// Filter applying the thresholds of `config`
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            background: BackgroundSites::default(),
            counts: FilterCounts::default(),
        }
    }

    /// Checks every threshold independently and records background deletion sites
    pub fn check(&mut self, locus: &LocusObservation) -> Verdict {
        let config = self.config;
        let mut reasons = Vec::new();

        if locus.bs_del < config.min_bs_del {
            reasons.push(FilterReason::MinDelBs);
        }
        if locus.bs_frac() < config.min_bs_frac {
            reasons.push(FilterReason::MinBsFrac);
        }
        if locus.bs_cov < config.min_bs_cov {
            reasons.push(FilterReason::MinBsCov);
        }
        if config.has_control {
            if locus.nbs_frac() > config.max_nbs_frac {
                reasons.push(FilterReason::MaxNbsFrac);
            }
            if locus.nbs_cov < config.min_nbs_cov {
                reasons.push(FilterReason::MinNbsCov);
            }
        }

        if reasons == [FilterReason::MaxNbsFrac]
            && locus.bs_cov >= config.min_bs_cov
            && locus.bs_del >= config.min_bs_del
        {
            self.background
                .insert(&locus.chrom, locus.pos.saturating_sub(1));
        }

        let verdict = if reasons.is_empty() {
            Verdict::Passed
        } else {
            Verdict::Failed(reasons)
        };
        self.counts.record(&verdict);
        verdict
    }

    /// Tallies so far
    pub fn counts(&self) -> &FilterCounts {
        &self.counts
    }

    /// Hands over the background sites and tallies once the stream is consumed
    pub fn finish(self) -> (BackgroundSites, FilterCounts) {
        (self.background, self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(pos: u64, bs: (u32, u32), nbs: (u32, u32)) -> LocusObservation {
        LocusObservation {
            chrom: "chr1".to_string(),
            pos,
            bs_del: bs.0,
            bs_cov: bs.1,
            nbs_del: nbs.0,
            nbs_cov: nbs.1,
            forward: 10,
            reverse: 0,
        }
    }

    #[test]
    fn strand_calls() {
        assert_eq!(Strand::call(10, 0), Strand::Forward);
        assert_eq!(Strand::call(10, 5), Strand::Forward);
        assert_eq!(Strand::call(10, 6), Strand::AmbiguousForward);
        assert_eq!(Strand::call(0, 10), Strand::Reverse);
        assert_eq!(Strand::call(6, 10), Strand::AmbiguousReverse);
        assert_eq!(Strand::call(5, 5), Strand::AmbiguousReverse);
        assert_eq!(Strand::call(0, 0), Strand::Unknown);
        assert_eq!(Strand::call(6, 10).to_string(), "-*");
        assert_eq!(Strand::Unknown.direction(), Direction::Minus);
    }

    #[test]
    fn passing_locus() {
        let config = Config::default();
        let mut filter = LocusFilter::new(&config);
        let verdict = filter.check(&locus(7, (10, 20), (0, 20)));
        assert!(verdict.is_pass());
        assert_eq!(verdict.to_string(), "PASSED");
        assert_eq!(filter.counts().passed, 1);
    }

    #[test]
    fn too_few_deletions_always_fail() {
        let config = Config::default();
        let mut filter = LocusFilter::new(&config);
        let verdict = filter.check(&locus(7, (4, 20), (0, 20)));
        assert_eq!(verdict, Verdict::Failed(vec![FilterReason::MinDelBs]));
        assert_eq!(verdict.to_string(), "minDelBs;");
    }

    #[test]
    fn background_deletion_is_recorded() {
        let config = Config::default();
        let mut filter = LocusFilter::new(&config);
        let verdict = filter.check(&locus(50, (10, 20), (1, 20)));
        assert_eq!(verdict, Verdict::Failed(vec![FilterReason::MaxNbsFrac]));
        assert_eq!(verdict.to_string(), "minNbsFrac;");

        let (background, counts) = filter.finish();
        assert_eq!(background.len(), 1);
        assert!(background.any_within("chr1", 49, 0));
        assert_eq!(counts.max_nbs_frac, 1);
        assert_eq!(counts.passed, 0);
    }

    #[test]
    fn background_requires_sole_failure() {
        let config = Config::default();
        let mut filter = LocusFilter::new(&config);
        filter.check(&locus(50, (3, 20), (5, 20)));
        let (background, counts) = filter.finish();
        assert!(background.is_empty());
        assert_eq!(counts.min_del_bs, 1);
        assert_eq!(counts.max_nbs_frac, 1);
    }

    #[test]
    fn zero_coverage_fails_without_panicking() {
        let config = Config::default();
        let mut filter = LocusFilter::new(&config);
        let verdict = filter.check(&locus(1, (0, 0), (0, 0)));
        assert_eq!(
            verdict,
            Verdict::Failed(vec![
                FilterReason::MinDelBs,
                FilterReason::MinBsFrac,
                FilterReason::MinBsCov,
                FilterReason::MinNbsCov,
            ])
        );
    }

    #[test]
    fn control_checks_skipped_without_control() {
        let config = Config {
            has_control: false,
            ..Config::default()
        };
        let mut filter = LocusFilter::new(&config);
        assert!(filter.check(&locus(1, (10, 20), (0, 0))).is_pass());
    }

    #[test]
    fn control_counts_can_be_dropped() {
        let l = locus(3, (10, 20), (4, 20)).without_control();
        assert_eq!((l.nbs_del, l.nbs_cov), (0, 0));
        assert_eq!((l.bs_del, l.bs_cov), (10, 20));
        assert_eq!(l.nbs_frac(), 0.0);
    }

    #[test]
    fn background_window_is_inclusive() {
        let mut sites = BackgroundSites::default();
        sites.insert("chr1", 100);
        assert!(sites.any_within("chr1", 105, 5));
        assert!(sites.any_within("chr1", 95, 5));
        assert!(!sites.any_within("chr1", 106, 5));
        assert!(!sites.any_within("chr2", 100, 5));
        assert!(sites.any_within("chr1", 3, 200));
    }
}
