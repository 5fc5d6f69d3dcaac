use crate::config::Config;
use crate::error::Error;
use crate::genomic::{is_homopolymer, Reference};
use crate::group::PositionGroup;
use crate::input::TabRecords;
use crate::locus::BackgroundSites;
use crate::Result;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Biotype given to repeat elements
pub const REPEAT_BIOTYPE: &str = "repbase";

/// Classification of a group after the artifact and annotation checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterFlag {
    /// Not classified yet
    NA,
    /// Bisulfite p-value above the cutoff
    LowConfidence,
    /// Significant deletions in the non-bisulfite sample at the same position
    HighBackgroundExact,
    /// Non-bisulfite deletions close by
    HighBackgroundProx,
    /// Close to an exon boundary
    InFlank,
    /// Inside a C/T or G/A run
    Homopolymer,
    /// No overlapping feature
    IntronIntergenic,
    /// Overlaps at least one feature
    Annotated,
}

impl FilterFlag {
    /// Groups taking part in the multiple testing correction
    pub fn is_correctable(&self) -> bool {
        matches!(
            self,
            FilterFlag::Annotated | FilterFlag::IntronIntergenic | FilterFlag::LowConfidence
        )
    }
}

impl fmt::Display for FilterFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self {
            FilterFlag::NA => "NA",
            FilterFlag::LowConfidence => "LowConfidence",
            FilterFlag::HighBackgroundExact => "HighBackgroundExact",
            FilterFlag::HighBackgroundProx => "HighBackgroundProx",
            FilterFlag::InFlank => "InFlank",
            FilterFlag::Homopolymer => "Homopolymer",
            FilterFlag::IntronIntergenic => "Intron/Intergenic",
            FilterFlag::Annotated => "Annotated",
        };
        write!(f, "{}", flag)
    }
}

/// Named interval `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    /// 0-based start
    pub start: u64,
    /// Exclusive end
    pub end: u64,
    /// Gene, transcript or repeat name
    pub name: String,
    /// Biotype of the feature
    pub biotype: String,
}

impl Feature {
    /// Feature from `start` to `end` with its name and biotype
    pub fn new<S: Into<String>>(start: u64, end: u64, name: S, biotype: S) -> Self {
        Self {
            start,
            end,
            name: name.into(),
            biotype: biotype.into(),
        }
    }

    /// Strict containment, the boundaries themselves are outside
    pub fn strictly_contains(&self, pos: u64) -> bool {
        self.start < pos && pos < self.end
    }
}

/// Per chromosome features, kept sorted by start
#[derive(Debug, Default, Clone)]
pub struct FeatureIndex(HashMap<String, Vec<Feature>>);

impl FeatureIndex {
    /// Sorts every chromosome once, features with equal starts keep their input order
    pub fn new(mut features: HashMap<String, Vec<Feature>>) -> Self {
        for list in features.values_mut() {
            list.sort_by_key(|feature| feature.start);
        }
        Self(features)
    }

    /// Features strictly containing `pos`, stopping at the first feature starting past it
    pub fn containing<'a>(&'a self, chrom: &str, pos: u64) -> impl Iterator<Item = &'a Feature> {
        self.0
            .get(chrom)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
            .iter()
            .take_while(move |feature| feature.start <= pos)
            .filter(move |feature| feature.strictly_contains(pos))
    }

    /// Number of features over all chromosomes
    pub fn len(&self) -> usize {
        self.0.values().map(|list| list.len()).sum()
    }

    /// No features
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Gene name and biotype of a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptInfo {
    /// Gene name, falls back to the transcript id
    pub name: String,
    /// Biotype of the gene
    pub biotype: String,
}

/// Interval sets used to classify groups
#[derive(Debug, Default)]
pub struct Annotation {
    /// Exons and repeats
    pub genes: FeatureIndex,
    /// Windows around internal exon boundaries
    pub flanks: FeatureIndex,
}

/// Builds the gene and flank features from the tables on disk
#[derive(Debug, Default)]
pub struct AnnotationBuilder {
    genes: HashMap<String, Vec<Feature>>,
    flanks: HashMap<String, Vec<Feature>>,
    biomart: HashMap<String, TranscriptInfo>,
}

impl AnnotationBuilder {
    /// Builder without any tables loaded
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the biomart table `transcript <ignored> name biotype`
    pub fn read_biomart<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        info!("Loading biomart annotations from {}...", path.display());
        for record in TabRecords::from_path(path)? {
            let record = record?;
            let transcript = record.field(0)?.trim().to_string();
            let name = record.get(2).unwrap_or("");
            let biotype = record.get(3).unwrap_or("");
            if transcript.is_empty() {
                return Err(record.malformed("missing transcript identifier"));
            }
            let info = TranscriptInfo {
                name: if name.is_empty() {
                    transcript.clone()
                } else {
                    name.to_string()
                },
                biotype: if biotype.is_empty() {
                    "NA".to_string()
                } else {
                    biotype.to_string()
                },
            };
            self.biomart.insert(transcript, info);
        }
        debug!("Read {} biomart transcripts", self.biomart.len());
        Ok(self)
    }

    /// Reads a refFlat-like gene table keyed by the transcript id in the first column,
    /// the chromosome in the third and exon starts/ends in the tenth and eleventh. Every exon becomes a gene feature and every internal
    /// exon boundary a flank of `flank_length` on both sides.
    pub fn read_gene_table<P: AsRef<Path>>(
        &mut self,
        path: P,
        flank_length: u64,
    ) -> Result<&mut Self> {
        let path = path.as_ref();
        info!("Loading gene models from {}...", path.display());
        for record in TabRecords::from_path(path)? {
            let record = record?;
            if record.len() < 11 {
                return Err(record.malformed(format!(
                    "expected 11 columns, got {}",
                    record.len()
                )));
            }
            let transcript = record.field(0)?.trim();
            let chrom = record.field(2)?.trim();
            let starts = parse_coordinates(record.field(9)?).map_err(|e| record.malformed(e))?;
            let ends = parse_coordinates(record.field(10)?).map_err(|e| record.malformed(e))?;
            if starts.len() != ends.len() {
                return Err(record.malformed("exon starts and ends differ in number"));
            }

            let (name, biotype) = match self.biomart.get(transcript) {
                Some(info) => (info.name.clone(), info.biotype.clone()),
                None => ("NA".to_string(), "NA".to_string()),
            };
            self.add_transcript(chrom, &starts, &ends, &name, &biotype, flank_length);
        }
        Ok(self)
    }

    fn add_transcript(
        &mut self,
        chrom: &str,
        starts: &[u64],
        ends: &[u64],
        name: &str,
        biotype: &str,
        flank_length: u64,
    ) {
        let genes = self.genes.entry(chrom.to_string()).or_default();
        let flanks = self.flanks.entry(chrom.to_string()).or_default();
        let last = starts.len().saturating_sub(1);

        for (i, (&start, &end)) in starts.iter().zip(ends.iter()).enumerate() {
            genes.push(Feature::new(start, end, name, biotype));
            if i != 0 {
                flanks.push(Feature::new(
                    start.saturating_sub(flank_length),
                    start + flank_length,
                    name,
                    "NA",
                ));
            }
            if i != last {
                flanks.push(Feature::new(
                    end.saturating_sub(flank_length),
                    end + flank_length,
                    name,
                    "NA",
                ));
            }
        }
    }

    /// Reads repeat elements from a BED file into the gene features
    pub fn read_repeats<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        info!("Loading repeat annotations from {}...", path.display());
        let (rdr, _) = niffler::from_path(path)?;
        let mut bed_rdr = bio::io::bed::Reader::new(rdr);
        for (i, record) in bed_rdr.records().enumerate() {
            let record = record.map_err(|_| Error::BedRecordError(i + 1))?;
            if record.end() < record.start() {
                return Err(Error::IncorrectInterval(i + 1, record.end(), record.start()));
            }
            let repeats = self.genes.entry(record.chrom().to_string()).or_default();
            repeats.push(Feature::new(
                record.start(),
                record.end(),
                record.name().unwrap_or("NA"),
                REPEAT_BIOTYPE,
            ));
        }
        Ok(self)
    }

    /// Sorts the features once, they are read-only afterwards
    pub fn build(self) -> Annotation {
        let annotation = Annotation {
            genes: FeatureIndex::new(self.genes),
            flanks: FeatureIndex::new(self.flanks),
        };
        info!(
            "Loaded {} gene/repeat features and {} flanks",
            annotation.genes.len(),
            annotation.flanks.len()
        );
        annotation
    }
}

fn parse_coordinates(field: &str) -> std::result::Result<Vec<u64>, String> {
    field
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid coordinate `{}`", s))
        })
        .collect()
}

/// Assigns the first matching classification to a group with computed p-values
pub fn classify(
    group: &mut PositionGroup,
    annotation: &Annotation,
    reference: &Reference,
    config: &Config,
) -> Result<()> {
    if group.bs_pval > config.pval {
        group.annotate(FilterFlag::LowConfidence, "NA", "NA");
        return Ok(());
    }
    if group.nbs_pval <= config.pval {
        group.annotate(FilterFlag::HighBackgroundExact, "NA", "NA");
        return Ok(());
    }

    let rep = group.representative();
    let chrom = rep.chrom.clone();
    let pos = rep.pos;

    if annotation.flanks.containing(&chrom, pos).next().is_some() {
        group.annotate(FilterFlag::InFlank, "NA", "NA");
        return Ok(());
    }

    if is_homopolymer(reference.window(&chrom, pos, config.hp_length)?) {
        group.annotate(FilterFlag::Homopolymer, "NA", "NA");
        return Ok(());
    }

    let mut names: Vec<&str> = Vec::new();
    let mut biotypes: Vec<&str> = Vec::new();
    for feature in annotation.genes.containing(&chrom, pos) {
        if !names.contains(&feature.name.as_str()) {
            names.push(&feature.name);
            biotypes.push(&feature.biotype);
        }
    }

    if names.is_empty() {
        group.annotate(FilterFlag::IntronIntergenic, "NA", "NA");
    } else {
        let (names, biotypes) = (names.join(";"), biotypes.join(";"));
        group.annotate(FilterFlag::Annotated, names, biotypes);
    }
    Ok(())
}

/// Demotes annotation-ready groups lying within `distance` of a background deletion
pub fn flag_background_proximity(
    groups: &mut [PositionGroup],
    background: &BackgroundSites,
    distance: u64,
) -> usize {
    let mut flagged = 0;
    for group in groups.iter_mut() {
        if !matches!(
            group.filter,
            FilterFlag::Annotated | FilterFlag::IntronIntergenic
        ) {
            continue;
        }
        let rep = group.representative();
        if background.any_within(&rep.chrom, rep.pos, distance) {
            debug!(
                "{}:{} is close to a non-bisulfite deletion",
                rep.chrom,
                rep.pos + 1
            );
            group.annotate(FilterFlag::HighBackgroundProx, "NA", "NA");
            flagged += 1;
        }
    }
    flagged
}
