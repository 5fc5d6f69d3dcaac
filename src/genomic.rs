use crate::error::Error;
use crate::Result;
use log::{debug, info};
use std::collections::HashMap;
use std::path::Path;

/// Uppercase reference sequences keyed by chromosome, remembering the FASTA order
#[derive(Debug, Default)]
pub struct Reference {
    seqs: HashMap<String, Vec<u8>>,
    ranks: HashMap<String, usize>,
}

impl Reference {
    /// Reads a (possibly gzipped) FASTA file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        info!("Loading reference sequence from {}...", path.display());
        let (rdr, _) = niffler::from_path(path)?;
        Self::from_reader(bio::io::fasta::Reader::new(rdr))
    }

    /// Collects all records of a FASTA reader
    pub fn from_reader<T: std::io::BufRead>(rdr: bio::io::fasta::Reader<T>) -> Result<Self> {
        let mut reference = Self::default();
        for record in rdr.records() {
            let record = record?;
            debug!("Read reference record {} ({} bp)", record.id(), record.seq().len());
            reference.insert(record.id(), record.seq().to_ascii_uppercase());
        }
        Ok(reference)
    }

    /// Adds a sequence, uppercasing it
    pub fn insert<S: Into<String>>(&mut self, chrom: S, mut seq: Vec<u8>) {
        let chrom = chrom.into();
        seq.make_ascii_uppercase();
        if self.seqs.insert(chrom.clone(), seq).is_none() {
            let rank = self.ranks.len();
            self.ranks.insert(chrom, rank);
        }
    }

    /// Full sequence of a chromosome
    pub fn seq(&self, chrom: &str) -> Result<&[u8]> {
        self.seqs
            .get(chrom)
            .map(|seq| seq.as_slice())
            .ok_or_else(|| Error::MissingReference(chrom.to_string()))
    }

    /// Reference base at a 0-based coordinate
    pub fn base_at(&self, chrom: &str, pos: u64) -> Result<u8> {
        let seq = self.seq(chrom)?;
        seq.get(pos as usize)
            .copied()
            .ok_or_else(|| Error::OutOfReference {
                chrom: chrom.to_string(),
                pos,
                len: seq.len(),
            })
    }

    /// Sequence starting at `pos` of at most `len` bases, clipped at the chromosome end
    pub fn window(&self, chrom: &str, pos: u64, len: usize) -> Result<&[u8]> {
        let seq = self.seq(chrom)?;
        let start = pos as usize;
        if start >= seq.len() {
            return Err(Error::OutOfReference {
                chrom: chrom.to_string(),
                pos,
                len: seq.len(),
            });
        }
        let end = (start + len).min(seq.len());
        Ok(&seq[start..end])
    }

    /// Position of the chromosome in the FASTA, used to order pileup streams
    pub fn rank(&self, chrom: &str) -> Result<usize> {
        self.ranks
            .get(chrom)
            .copied()
            .ok_or_else(|| Error::MissingReference(chrom.to_string()))
    }

    /// Number of sequences
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// No sequences loaded
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Checks if every nucleotide is C/T or every nucleotide is G/A
pub fn is_homopolymer(seq: &[u8]) -> bool {
    seq.iter().all(|nuc| matches!(nuc, b'C' | b'T'))
        || seq.iter().all(|nuc| matches!(nuc, b'G' | b'A'))
}
