use crate::annotation::FilterFlag;
use crate::locus::{LocusObservation, Strand};
use crate::origin::{BaseFlag, REPORTED_BASE};

/// Sentinel fraction of a sample without coverage
pub const NO_COVERAGE: f64 = -1.0;

/// A locus that passed the thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    /// Chromosome name
    pub chrom: String,
    /// 0-based coordinate
    pub pos: u64,
    /// Strand call of the reads covering the locus
    pub strand: Strand,
    /// Reference base
    pub base: u8,
    /// Coverage in the bisulfite sample
    pub bs_depth: u32,
    /// Deletions in the bisulfite sample
    pub bs_del: u32,
    /// Deletion fraction in the bisulfite sample
    pub bs_frac: f64,
    /// Coverage in the non-bisulfite sample
    pub nbs_depth: u32,
    /// Deletions in the non-bisulfite sample
    pub nbs_del: u32,
    /// Deletion fraction in the non-bisulfite sample or [`NO_COVERAGE`]
    pub nbs_frac: f64,
    /// Coordinate the deletion is predicted to originate from
    pub pred_pos: Option<u64>,
    /// How the originating base was determined
    pub base_flag: Option<BaseFlag>,
}

impl Position {
    /// Builds a position from a passing locus and the reference base at it
    pub fn new(locus: &LocusObservation, base: u8) -> Self {
        let bs_frac = if locus.bs_cov == 0 {
            0.0
        } else {
            locus.bs_del as f64 / locus.bs_cov as f64
        };
        let nbs_frac = if locus.nbs_cov == 0 {
            NO_COVERAGE
        } else {
            locus.nbs_del as f64 / locus.nbs_cov as f64
        };

        Self {
            chrom: locus.chrom.clone(),
            pos: locus.pos.saturating_sub(1),
            strand: Strand::call(locus.forward, locus.reverse),
            base: base.to_ascii_uppercase(),
            bs_depth: locus.bs_cov,
            bs_del: locus.bs_del,
            bs_frac,
            nbs_depth: locus.nbs_cov,
            nbs_del: locus.nbs_del,
            nbs_frac,
            pred_pos: None,
            base_flag: None,
        }
    }

    /// Base written out, the target base once the origin is resolved
    pub fn reported_base(&self) -> u8 {
        match self.base_flag {
            Some(_) => REPORTED_BASE,
            None => self.base,
        }
    }
}

/// Contiguous run of positions sharing one deletion signal
#[derive(Debug, Clone, PartialEq)]
pub struct PositionGroup {
    positions: Vec<Position>,
    representative: usize,
    /// Binomial p-value of the bisulfite sample
    pub bs_pval: f64,
    /// Binomial p-value of the non-bisulfite sample
    pub nbs_pval: f64,
    /// Corrected p-value, set only for groups taking part in the correction
    pub qval: Option<f64>,
    /// Whether the q-value is below the cutoff
    pub qval_pass: Option<bool>,
    /// Classification assigned by the annotation filter
    pub filter: FilterFlag,
    /// Names of the overlapping features
    pub gene_name: String,
    /// Biotypes of the overlapping features
    pub biotype: String,
}

impl Default for PositionGroup {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            representative: 0,
            bs_pval: 1.0,
            nbs_pval: 1.0,
            qval: None,
            qval_pass: None,
            filter: FilterFlag::NA,
            gene_name: "NA".to_string(),
            biotype: "NA".to_string(),
        }
    }
}

impl PositionGroup {
    /// Adds a position and updates the representative, earlier positions win ties
    pub fn push(&mut self, position: Position) {
        self.positions.push(position);
        let last = self.positions.len() - 1;
        if self.positions[last].bs_frac > self.positions[self.representative].bs_frac {
            self.representative = last;
        }
    }

    /// Members in coordinate order
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// No members yet
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Member with the highest bisulfite deletion fraction
    ///
    /// # Panics
    /// On an empty group, which the builder and splitter never emit.
    pub fn representative(&self) -> &Position {
        &self.positions[self.representative]
    }

    /// Mutable access for the base-origin resolution
    pub fn representative_mut(&mut self) -> &mut Position {
        &mut self.positions[self.representative]
    }

    /// Coordinate of the last member
    pub fn last_pos(&self) -> Option<u64> {
        self.positions.last().map(|p| p.pos)
    }

    /// Chromosome of the members
    pub fn chrom(&self) -> Option<&str> {
        self.positions.first().map(|p| p.chrom.as_str())
    }

    /// Checks if a position directly extends this group
    pub fn is_adjacent(&self, position: &Position) -> bool {
        match self.positions.last() {
            Some(last) => last.chrom == position.chrom && last.pos + 1 == position.pos,
            None => false,
        }
    }

    /// Splits the group wherever the fraction drops below `split_thresh` times the
    /// group maximum. The dropping position belongs to neither side.
    pub fn split(self, split_thresh: f64) -> Vec<PositionGroup> {
        if self.is_empty() {
            return Vec::new();
        }
        let thresh = self.representative().bs_frac * split_thresh;

        let mut groups = Vec::new();
        let mut current = PositionGroup::default();
        for position in self.positions {
            if position.bs_frac < thresh {
                if !current.is_empty() {
                    groups.push(current);
                }
                current = PositionGroup::default();
            } else {
                current.push(position);
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    /// Sets the annotation outcome
    pub fn annotate<S: Into<String>>(&mut self, filter: FilterFlag, gene_name: S, biotype: S) {
        self.filter = filter;
        self.gene_name = gene_name.into();
        self.biotype = biotype.into();
    }
}

/// Streams positions into contiguous groups
#[derive(Debug, Default)]
pub struct GroupBuilder {
    current: PositionGroup,
    sealed: Vec<PositionGroup>,
}

impl GroupBuilder {
    /// Builder without an open group
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the open group or seals it and starts a new one
    pub fn push(&mut self, position: Position) {
        if !self.current.is_adjacent(&position) {
            let sealed = std::mem::take(&mut self.current);
            if !sealed.is_empty() {
                self.sealed.push(sealed);
            }
        }
        self.current.push(position);
    }

    /// Number of groups sealed so far
    pub fn sealed(&self) -> usize {
        self.sealed.len()
    }

    /// Seals the open group and returns all groups in stream order
    pub fn finish(mut self) -> Vec<PositionGroup> {
        if !self.current.is_empty() {
            self.sealed.push(self.current);
        }
        self.sealed
    }
}
