//! Stage driver from the locus stream to the final, corrected groups.
use crate::annotation::{classify, flag_background_proximity, Annotation, FilterFlag};
use crate::config::Config;
use crate::genomic::Reference;
use crate::group::{GroupBuilder, Position, PositionGroup};
use crate::locus::{BackgroundSites, FilterCounts, LocusFilter, LocusObservation};
use crate::origin::resolve_origin;
use crate::stats::{bh_adjust_descending, binomial_pval, QVALUE_CUTOFF};
use crate::Result;
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;

/// Loci between two progress messages
pub const PROGRESS_INTERVAL: usize = 5_000_000;

/// Tallies of every stage, reported once the run finishes
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Threshold filtering of the loci
    pub filter: FilterCounts,
    /// Recorded non-bisulfite deletion sites
    pub background_sites: usize,
    /// Groups left after collapsing and splitting
    pub after_collapse: usize,
    /// Groups failing the bisulfite p-value cutoff
    pub low_confidence: usize,
    /// Groups significant in the non-bisulfite sample
    pub high_background_exact: usize,
    /// Groups near a non-bisulfite deletion site
    pub high_background_prox: usize,
    /// Groups in a homopolymer window
    pub homopolymer: usize,
    /// Groups in an exon boundary flank
    pub in_flank: usize,
    /// Groups overlapping a feature
    pub annotated: usize,
    /// Groups without an overlapping feature
    pub unannotated: usize,
    /// Groups dropped for sharing a predicted origin
    pub shared_all: usize,
    /// Dropped groups that would have taken part in the correction
    pub shared_usable: usize,
    /// Groups taking part in the correction
    pub corrected: usize,
    /// Corrected groups below the q-value cutoff
    pub qvalue_passed: usize,
}

impl RunSummary {
    /// Annotated and unannotated groups
    pub fn annotation_ready(&self) -> usize {
        self.annotated + self.unannotated
    }

    fn tally(&mut self, groups: &[PositionGroup]) {
        for group in groups {
            match group.filter {
                FilterFlag::LowConfidence => self.low_confidence += 1,
                FilterFlag::HighBackgroundExact => self.high_background_exact += 1,
                FilterFlag::HighBackgroundProx => self.high_background_prox += 1,
                FilterFlag::Homopolymer => self.homopolymer += 1,
                FilterFlag::InFlank => self.in_flank += 1,
                FilterFlag::Annotated => self.annotated += 1,
                FilterFlag::IntronIntergenic => self.unannotated += 1,
                FilterFlag::NA => {}
            }
        }
    }
}

/// Runs all stages against one reference and annotation
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a Config,
    reference: &'a Reference,
    annotation: &'a Annotation,
}

impl<'a> Pipeline<'a> {
    /// Pipeline over a reference and its annotation
    pub fn new(config: &'a Config, reference: &'a Reference, annotation: &'a Annotation) -> Self {
        Self {
            config,
            reference,
            annotation,
        }
    }

    /// Consumes the locus stream and returns the surviving groups in stream order
    pub fn run<I>(
        &self,
        loci: I,
        audit: Option<&mut dyn Write>,
    ) -> Result<(Vec<PositionGroup>, RunSummary)>
    where
        I: Iterator<Item = Result<LocusObservation>>,
    {
        let mut summary = RunSummary::default();

        let (groups, background, counts) = self.collect_groups(loci, audit)?;
        summary.filter = counts;
        summary.background_sites = background.len();

        let mut groups = split_groups(groups, self.config.split_thresh);
        summary.after_collapse = groups.len();
        info!("{} groups after collapsing", groups.len());

        info!("Annotating deletions...");
        self.score_groups(&mut groups)?;

        info!("Scanning for nearby deletions...");
        let flagged = flag_background_proximity(&mut groups, &background, self.config.del_distance);
        debug!("{} groups close to non-bisulfite deletions", flagged);
        summary.tally(&groups);

        info!("Scanning for shared originating Ts...");
        let (mut groups, shared_all, shared_usable) = resolve_shared_sites(groups);
        summary.shared_all = shared_all;
        summary.shared_usable = shared_usable;

        info!("Calculating q-values...");
        let (corrected, passed) = assign_qvalues(&mut groups);
        summary.corrected = corrected;
        summary.qvalue_passed = passed;

        Ok((groups, summary))
    }

    /// Filters loci and builds contiguous groups, writing the audit line of every locus
    pub fn collect_groups<I>(
        &self,
        loci: I,
        mut audit: Option<&mut dyn Write>,
    ) -> Result<(Vec<PositionGroup>, BackgroundSites, FilterCounts)>
    where
        I: Iterator<Item = Result<LocusObservation>>,
    {
        let mut filter = LocusFilter::new(self.config);
        let mut builder = GroupBuilder::new();

        for locus in loci {
            let locus = locus?;
            let verdict = filter.check(&locus);
            if let Some(out) = audit.as_mut() {
                writeln!(out, "{}", locus.audit_row(&verdict))?;
            }
            if verdict.is_pass() {
                let base = self
                    .reference
                    .base_at(&locus.chrom, locus.pos.saturating_sub(1))?;
                builder.push(Position::new(&locus, base));
            }

            let total = filter.counts().total;
            if total % PROGRESS_INTERVAL == 0 {
                info!(
                    "Processed {} loci, {} groups so far",
                    total,
                    builder.sealed()
                );
            }
        }

        let (background, counts) = filter.finish();
        info!(
            "Processed {} loci, {} passed, {} background deletion sites",
            counts.total,
            counts.passed,
            background.len()
        );
        Ok((builder.finish(), background, counts))
    }

    /// Resolves the origin, tests both samples and classifies every group
    pub fn score_groups(&self, groups: &mut [PositionGroup]) -> Result<()> {
        let config = self.config;
        let reference = self.reference;
        let annotation = self.annotation;
        groups.par_iter_mut().try_for_each(|group| -> Result<()> {
            resolve_origin(group, reference, config.hp_length)?;
            let (bs_pval, nbs_pval) = {
                let rep = group.representative();
                (
                    binomial_pval(rep.bs_depth, rep.bs_del, config.error_rate)?,
                    binomial_pval(rep.nbs_depth, rep.nbs_del, config.error_rate)?,
                )
            };
            group.bs_pval = bs_pval;
            group.nbs_pval = nbs_pval;
            classify(group, annotation, reference, config)
        })
    }
}

/// Splits every sealed group, keeping stream order
pub fn split_groups(groups: Vec<PositionGroup>, split_thresh: f64) -> Vec<PositionGroup> {
    groups
        .into_iter()
        .flat_map(|group| group.split(split_thresh))
        .collect()
}

/// Keeps one group per chromosome and predicted origin, the first one with the highest
/// representative fraction. Groups without an origin share one key per chromosome.
///
/// Returns the kept groups, the number dropped and the number of dropped groups that
/// would have been corrected.
pub fn resolve_shared_sites(groups: Vec<PositionGroup>) -> (Vec<PositionGroup>, usize, usize) {
    let mut winners: HashMap<(String, Option<u64>), usize> = HashMap::new();
    for (i, group) in groups.iter().enumerate() {
        let rep = group.representative();
        let key = (rep.chrom.clone(), rep.pred_pos);
        let replace = match winners.get(&key) {
            Some(&best) => rep.bs_frac > groups[best].representative().bs_frac,
            None => true,
        };
        if replace {
            winners.insert(key, i);
        }
    }

    let mut shared_all = 0;
    let mut shared_usable = 0;
    let mut kept = Vec::with_capacity(winners.len());
    for (i, group) in groups.into_iter().enumerate() {
        let rep = group.representative();
        if winners.get(&(rep.chrom.clone(), rep.pred_pos)) == Some(&i) {
            kept.push(group);
        } else {
            shared_all += 1;
            if group.filter.is_correctable() {
                shared_usable += 1;
            }
        }
    }
    (kept, shared_all, shared_usable)
}

/// Sets the q-value of every correctable group.
///
/// Returns the number of corrected groups and how many of them pass the cutoff.
pub fn assign_qvalues(groups: &mut [PositionGroup]) -> (usize, usize) {
    let mut eligible: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, group)| group.filter.is_correctable())
        .map(|(i, _)| i)
        .collect();
    eligible.sort_by(|&a, &b| {
        groups[b]
            .bs_pval
            .partial_cmp(&groups[a].bs_pval)
            .unwrap_or(Ordering::Equal)
    });

    let pvals: Vec<f64> = eligible.iter().map(|&i| groups[i].bs_pval).collect();
    let qvals = bh_adjust_descending(&pvals);

    let mut passed = 0;
    for (&i, &qval) in eligible.iter().zip(qvals.iter()) {
        let pass = qval < QVALUE_CUTOFF;
        if pass {
            passed += 1;
        }
        groups[i].qval = Some(qval);
        groups[i].qval_pass = Some(pass);
    }
    (eligible.len(), passed)
}
