//! Readers producing the locus stream.
//!
//! Loci come either from a parsed table (the audit output of an earlier run) or
//! from one or two per-sample pileup tables. Two pileup tables are merged by
//! coordinate, a coordinate seen in only one of them gets zero counts for the
//! other sample.
use crate::error::Error;
use crate::genomic::Reference;
use crate::locus::LocusObservation;
use crate::Result;
use log::debug;
use std::cmp::Ordering;
use std::io::{BufRead, BufReader, Lines, Read};
use std::iter::{Enumerate, Peekable};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

/// Line of a tab separated file
#[derive(Debug, Clone)]
pub struct TabRecord {
    file: Rc<str>,
    /// 1-based line number
    pub line: usize,
    fields: Vec<String>,
}

impl TabRecord {
    /// Number of columns
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Line without any columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Column `idx`, an error if the line is too short
    pub fn field(&self, idx: usize) -> Result<&str> {
        self.fields
            .get(idx)
            .map(|field| field.as_str())
            .ok_or_else(|| self.malformed(format!("missing column {}", idx + 1)))
    }

    /// Column `idx` or `None` if the line is too short
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(|field| field.trim())
    }

    /// Parses column `idx`
    pub fn parse<T: FromStr>(&self, idx: usize, what: &str) -> Result<T> {
        let field = self.field(idx)?;
        field
            .trim()
            .parse::<T>()
            .map_err(|_| self.malformed(format!("invalid {} `{}`", what, field)))
    }

    /// 1-based coordinate at column `idx`
    pub fn position(&self, idx: usize) -> Result<u64> {
        match self.parse::<u64>(idx, "position")? {
            0 => Err(self.malformed("position must be 1-based, got 0")),
            pos => Ok(pos),
        }
    }

    /// Error pointing at this line
    pub fn malformed<S: Into<String>>(&self, reason: S) -> Error {
        Error::MalformedRecord {
            file: self.file.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }
}

/// Tab separated (possibly gzipped) file, skipping empty and `#` lines
pub struct TabRecords {
    file: Rc<str>,
    lines: Enumerate<Lines<BufReader<Box<dyn Read>>>>,
}

impl std::fmt::Debug for TabRecords {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabRecords")
            .field("file", &self.file)
            .finish()
    }
}

impl TabRecords {
    /// Opens a file, detecting compression
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        let (rdr, format) = niffler::from_path(path)?;
        debug!("Opened {} ({:?})", path.display(), format);
        Ok(Self::new(path.display().to_string(), rdr))
    }

    /// Wraps an already opened reader
    pub fn new<S: Into<String>>(name: S, rdr: Box<dyn Read>) -> Self {
        Self {
            file: Rc::from(name.into()),
            lines: BufReader::new(rdr).lines().enumerate(),
        }
    }
}

impl Iterator for TabRecords {
    type Item = Result<TabRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, line) = self.lines.next()?;
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(Ok(TabRecord {
                file: Rc::clone(&self.file),
                line: i + 1,
                fields: line
                    .trim_end_matches('\r')
                    .split('\t')
                    .map(String::from)
                    .collect(),
            }));
        }
    }
}

/// Reads `chrom pos bsDel bsCov nbsDel nbsCov forward reverse [status]` lines
#[derive(Debug)]
pub struct ParsedLoci(TabRecords);

impl ParsedLoci {
    /// Opens a parsed table, plain or gzipped
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self(TabRecords::from_path(path)?))
    }

    /// Reads parsed loci from already opened records
    pub fn new(records: TabRecords) -> Self {
        Self(records)
    }

    fn parse(record: &TabRecord) -> Result<LocusObservation> {
        if record.len() < 8 {
            return Err(record.malformed(format!(
                "expected at least 8 columns, got {}",
                record.len()
            )));
        }
        Ok(LocusObservation {
            chrom: record.field(0)?.to_string(),
            pos: record.position(1)?,
            bs_del: record.parse(2, "bisulfite deletions")?,
            bs_cov: record.parse(3, "bisulfite coverage")?,
            nbs_del: record.parse(4, "non-bisulfite deletions")?,
            nbs_cov: record.parse(5, "non-bisulfite coverage")?,
            forward: record.parse(6, "forward count")?,
            reverse: record.parse(7, "reverse count")?,
        })
    }
}

impl Iterator for ParsedLoci {
    type Item = Result<LocusObservation>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|record| record.and_then(|record| Self::parse(&record)))
    }
}

/// Deletion summary of one sample at one coordinate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLocus {
    /// Chromosome name
    pub chrom: String,
    /// 1-based position
    pub pos: u64,
    /// Reads with a deletion
    pub deletions: u32,
    /// Reads covering the position
    pub coverage: u32,
    /// Forward strand reads
    pub forward: u32,
    /// Reverse strand reads
    pub reverse: u32,
}

/// Reads `chrom pos deletions coverage forward reverse` lines of a single sample
#[derive(Debug)]
pub struct SampleLoci(TabRecords);

impl SampleLoci {
    /// Opens a per-sample deletion table, plain or gzipped
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self(TabRecords::from_path(path)?))
    }

    /// Reads sample loci from already opened records
    pub fn new(records: TabRecords) -> Self {
        Self(records)
    }

    fn parse(record: &TabRecord) -> Result<SampleLocus> {
        if record.len() < 6 {
            return Err(record.malformed(format!(
                "expected at least 6 columns, got {}",
                record.len()
            )));
        }
        Ok(SampleLocus {
            chrom: record.field(0)?.to_string(),
            pos: record.position(1)?,
            deletions: record.parse(2, "deletions")?,
            coverage: record.parse(3, "coverage")?,
            forward: record.parse(4, "forward count")?,
            reverse: record.parse(5, "reverse count")?,
        })
    }
}

impl Iterator for SampleLoci {
    type Item = Result<SampleLocus>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|record| record.and_then(|record| Self::parse(&record)))
    }
}

/// Outer join of a bisulfite and a non-bisulfite stream, both sorted by reference order.
/// An empty control stream yields the bisulfite loci with zero control counts.
#[derive(Debug)]
pub struct MergedLoci<'a, B, N>
where
    B: Iterator<Item = Result<SampleLocus>>,
    N: Iterator<Item = Result<SampleLocus>>,
{
    bs: Peekable<B>,
    nbs: Peekable<N>,
    reference: &'a Reference,
    last: Option<(usize, u64, String)>,
}

impl<'a, B, N> MergedLoci<'a, B, N>
where
    B: Iterator<Item = Result<SampleLocus>>,
    N: Iterator<Item = Result<SampleLocus>>,
{
    /// Joins the bisulfite and non-bisulfite streams in reference order
    pub fn new(bs: B, nbs: N, reference: &'a Reference) -> Self {
        Self {
            bs: bs.peekable(),
            nbs: nbs.peekable(),
            reference,
            last: None,
        }
    }

    fn check_order(&mut self, locus: &LocusObservation) -> Result<()> {
        let key = (self.reference.rank(&locus.chrom)?, locus.pos);
        if let Some((rank, pos, chrom)) = &self.last {
            if (*rank, *pos) >= key {
                return Err(Error::UnsortedLoci {
                    chrom: locus.chrom.clone(),
                    pos: locus.pos,
                    prev_chrom: chrom.clone(),
                    prev_pos: *pos,
                });
            }
        }
        self.last = Some((key.0, key.1, locus.chrom.clone()));
        Ok(())
    }

    fn merge(&mut self) -> Option<Result<LocusObservation>> {
        let reference = self.reference;
        let key = |locus: &SampleLocus| -> Result<(usize, u64)> {
            Ok((reference.rank(&locus.chrom)?, locus.pos))
        };
        let order = match (self.bs.peek(), self.nbs.peek()) {
            (None, None) => return None,
            (Some(Err(_)), _) => Ordering::Less,
            (_, Some(Err(_))) => Ordering::Greater,
            (Some(Ok(_)), None) => Ordering::Less,
            (None, Some(Ok(_))) => Ordering::Greater,
            (Some(Ok(bs)), Some(Ok(nbs))) => {
                let keys = key(bs).and_then(|b| Ok((b, key(nbs)?)));
                match keys {
                    Ok((b, n)) => b.cmp(&n),
                    Err(e) => return Some(Err(e)),
                }
            }
        };

        let locus = match order {
            Ordering::Less => self.bs.next()?.map(|bs| LocusObservation {
                chrom: bs.chrom,
                pos: bs.pos,
                bs_del: bs.deletions,
                bs_cov: bs.coverage,
                nbs_del: 0,
                nbs_cov: 0,
                forward: bs.forward,
                reverse: bs.reverse,
            }),
            Ordering::Greater => self.nbs.next()?.map(|nbs| LocusObservation {
                chrom: nbs.chrom,
                pos: nbs.pos,
                bs_del: 0,
                bs_cov: 0,
                nbs_del: nbs.deletions,
                nbs_cov: nbs.coverage,
                forward: nbs.forward,
                reverse: nbs.reverse,
            }),
            Ordering::Equal => {
                let bs = self.bs.next()?;
                let nbs = self.nbs.next()?;
                bs.and_then(|bs| {
                    nbs.map(|nbs| LocusObservation {
                        chrom: bs.chrom,
                        pos: bs.pos,
                        bs_del: bs.deletions,
                        bs_cov: bs.coverage,
                        nbs_del: nbs.deletions,
                        nbs_cov: nbs.coverage,
                        forward: bs.forward.saturating_add(nbs.forward),
                        reverse: bs.reverse.saturating_add(nbs.reverse),
                    })
                })
            }
        };
        Some(locus)
    }
}

impl<'a, B, N> Iterator for MergedLoci<'a, B, N>
where
    B: Iterator<Item = Result<SampleLocus>>,
    N: Iterator<Item = Result<SampleLocus>>,
{
    type Item = Result<LocusObservation>;

    fn next(&mut self) -> Option<Self::Item> {
        let locus = self.merge()?;
        Some(locus.and_then(|locus| {
            self.check_order(&locus)?;
            Ok(locus)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(text: &'static str) -> TabRecords {
        TabRecords::new("test.tsv", Box::new(text.as_bytes()))
    }

    fn reference() -> Reference {
        let mut reference = Reference::default();
        reference.insert("chr2", b"ACGT".to_vec());
        reference.insert("chr1", b"ACGT".to_vec());
        reference
    }

    fn sample(chrom: &str, pos: u64, deletions: u32, coverage: u32) -> Result<SampleLocus> {
        Ok(SampleLocus {
            chrom: chrom.to_string(),
            pos,
            deletions,
            coverage,
            forward: coverage,
            reverse: 0,
        })
    }

    #[test]
    fn parsed_table() {
        let loci: Vec<LocusObservation> = ParsedLoci::new(records(
            "chr1\t10\t5\t20\t0\t20\t18\t2\tPASSED\n\n# comment\nchr1\t11\t1\t20\t0\t20\t18\t2\n",
        ))
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(loci.len(), 2);
        assert_eq!(loci[0].pos, 10);
        assert_eq!(loci[0].bs_del, 5);
        assert_eq!(loci[0].reverse, 2);
        assert_eq!(loci[1].bs_del, 1);
    }

    #[test]
    fn malformed_parsed_line() {
        let result: Result<Vec<LocusObservation>> =
            ParsedLoci::new(records("chr1\t10\t5\t20\n")).collect();
        match result {
            Err(Error::MalformedRecord { line, .. }) => assert_eq!(line, 1),
            other => panic!("Expected a malformed record, got {:?}", other),
        }

        let result: Result<Vec<LocusObservation>> =
            ParsedLoci::new(records("chr1\t10\tfive\t20\t0\t20\t18\t2\n")).collect();
        assert!(matches!(result, Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn zero_position_is_malformed() {
        let result: Result<Vec<LocusObservation>> = ParsedLoci::new(records(
            "chr1\t1\t5\t20\t0\t20\t18\t2\nchr1\t0\t5\t20\t0\t20\t18\t2\n",
        ))
        .collect();
        match result {
            Err(Error::MalformedRecord { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("1-based"));
            }
            other => panic!("Expected a malformed record, got {:?}", other),
        }

        let result: Result<Vec<SampleLocus>> =
            SampleLoci::new(records("chr1\t0\t1\t9\t5\t4\n")).collect();
        assert!(matches!(result, Err(Error::MalformedRecord { line: 1, .. })));
    }

    #[test]
    fn sample_table() {
        let loci: Vec<SampleLocus> = SampleLoci::new(records("chr1\t3\t1\t9\t5\t4\n"))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(loci[0].coverage, 9);
        assert_eq!(loci[0].forward, 5);
    }

    #[test]
    fn outer_join_by_reference_order() {
        let reference = reference();
        let bs = vec![
            sample("chr2", 5, 3, 10),
            sample("chr2", 7, 4, 10),
            sample("chr1", 1, 2, 10),
        ];
        let nbs = vec![
            sample("chr2", 6, 1, 10),
            sample("chr2", 7, 1, 12),
            sample("chr1", 2, 1, 10),
        ];
        let merged: Vec<LocusObservation> =
            MergedLoci::new(bs.into_iter(), nbs.into_iter(), &reference)
                .collect::<Result<_>>()
                .unwrap();
        let coords: Vec<(&str, u64)> = merged
            .iter()
            .map(|l| (l.chrom.as_str(), l.pos))
            .collect();
        assert_eq!(
            coords,
            vec![("chr2", 5), ("chr2", 6), ("chr2", 7), ("chr1", 1), ("chr1", 2)]
        );
        assert_eq!((merged[0].nbs_del, merged[0].nbs_cov), (0, 0));
        assert_eq!((merged[1].bs_del, merged[1].bs_cov), (0, 0));
        assert_eq!(
            (merged[2].bs_del, merged[2].nbs_del, merged[2].nbs_cov),
            (4, 1, 12)
        );
        assert_eq!(merged[2].forward, 22);
    }

    #[test]
    fn strand_counts_saturate() {
        let reference = reference();
        let mut bs = sample("chr1", 2, 3, 10).unwrap();
        bs.forward = u32::MAX;
        bs.reverse = u32::MAX - 1;
        let mut nbs = sample("chr1", 2, 1, 10).unwrap();
        nbs.reverse = 5;
        let merged: Vec<LocusObservation> = MergedLoci::new(
            vec![Ok(bs)].into_iter(),
            vec![Ok(nbs)].into_iter(),
            &reference,
        )
        .collect::<Result<_>>()
        .unwrap();
        assert_eq!(merged[0].forward, u32::MAX);
        assert_eq!(merged[0].reverse, u32::MAX);
    }

    #[test]
    fn unsorted_input_is_an_error() {
        let reference = reference();
        let bs = vec![sample("chr1", 5, 3, 10), sample("chr2", 7, 4, 10)];
        let result: Result<Vec<LocusObservation>> =
            MergedLoci::new(bs.into_iter(), Vec::new().into_iter(), &reference).collect();
        assert!(matches!(result, Err(Error::UnsortedLoci { .. })));
    }

    #[test]
    fn unknown_chromosome_is_an_error() {
        let reference = reference();
        let bs = vec![sample("chrX", 5, 3, 10)];
        let nbs = vec![sample("chr1", 5, 3, 10)];
        let result: Result<Vec<LocusObservation>> =
            MergedLoci::new(bs.into_iter(), nbs.into_iter(), &reference).collect();
        assert!(matches!(result, Err(Error::MissingReference(_))));
    }
}
