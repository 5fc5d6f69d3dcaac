use thiserror::Error;

#[derive(Debug, Error)]
/// Errors of which majority are related to I/O issues or incorrect file format errors
pub enum Error {
    #[error("Could not read input file")]
    /// Could not read or write a file
    IoError(#[from] std::io::Error),
    #[error("Could not convert bytes in FASTA as it is invalid UTF-8")]
    /// Data is not in UTF-8 format
    NotUTF8(#[from] std::string::FromUtf8Error),
    #[error("Could not open (possibly compressed) file")]
    /// Compression detection or decoding error
    CompressedFileError(#[from] niffler::Error),
    #[error("Could not spawn threads")]
    /// Create thread pools erorr
    ThreadError,
    #[error("File `{0}` could not be found")]
    /// Input path does not exist
    FileNotFound(String),
    #[error("Malformed record in `{file}` on line {line}: {reason}")]
    /// A tab separated record could not be parsed
    MalformedRecord {
        /// File the record was read from
        file: String,
        /// 1-based line number
        line: usize,
        /// What was wrong with the record
        reason: String,
    },
    #[error("Could not read BED entry at line {0}")]
    /// Unparsable repeat BED entry
    BedRecordError(usize),
    #[error("Incorrect interval in BED entry on line {0}, end {1} is smaller than start {2} ")]
    /// Repeat BED entry with a negative length
    IncorrectInterval(usize, u64, u64),
    #[error("Chromosome `{0}` is not present in the reference")]
    /// Locus or group on a chromosome missing from the reference
    MissingReference(String),
    #[error("Position {pos} is beyond the end of `{chrom}` which is only {len} long")]
    /// Coordinate larger than the reference sequence
    OutOfReference {
        /// Chromosome name
        chrom: String,
        /// 0-based coordinate
        pos: u64,
        /// Reference length
        len: usize,
    },
    #[error("Loci are not sorted, {chrom}:{pos} comes after {prev_chrom}:{prev_pos}")]
    /// Pileup table is not in reference order
    UnsortedLoci {
        /// Offending chromosome
        chrom: String,
        /// Offending position
        pos: u64,
        /// Previous chromosome
        prev_chrom: String,
        /// Previous position
        prev_pos: u64,
    },
    #[error("Got {deletions} deletions for a depth of {depth}")]
    /// Deletion count larger than depth
    InvalidCounts {
        /// Number of deletions
        deletions: u32,
        /// Coverage depth
        depth: u32,
    },
    #[error("Binomial test could not be performed: {0}")]
    /// Distribution could not be built
    StatisticsError(String),
    #[error("Invalid configuration: {0}")]
    /// Settings outside their allowed range or missing inputs
    ConfigError(String),
}
