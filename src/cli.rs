use log::LevelFilter;
use rustypsi::config::Config;
use rustypsi::error::Error;
use rustypsi::Result;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "rustypsi",
    about = "Scores likely pseudouridine positions from bisulfite deletion signatures"
)]
pub(crate) struct RustyPsi {
    #[structopt(
        long,
        help = "Parsed table of a previous run (chrom pos bsDel bsCov nbsDel nbsCov forward reverse)",
        parse(from_os_str),
        conflicts_with_all = &["bis", "non-bis"]
    )]
    pub parsed: Option<PathBuf>,
    #[structopt(
        long,
        help = "Per position deletion table of the bisulfite sample (chrom pos deletions coverage forward reverse)",
        parse(from_os_str)
    )]
    pub bis: Option<PathBuf>,
    #[structopt(
        name = "non-bis",
        long = "non-bis",
        help = "Per position deletion table of the non-bisulfite sample",
        parse(from_os_str),
        requires = "bis",
        conflicts_with = "bis-only"
    )]
    pub non_bis: Option<PathBuf>,
    #[structopt(
        long = "ref-file",
        help = "Reference sequence (FASTA, optionally gzipped)",
        parse(from_os_str)
    )]
    pub ref_file: PathBuf,
    #[structopt(
        long = "ann-file",
        help = "Gene annotations in refFlat format",
        parse(from_os_str)
    )]
    pub ann_file: PathBuf,
    #[structopt(
        long = "biomart-file",
        help = "Biomart table with transcript, gene name and biotype",
        parse(from_os_str)
    )]
    pub biomart_file: Option<PathBuf>,
    #[structopt(
        long = "repbase-file",
        help = "Repeat annotations in BED format",
        parse(from_os_str)
    )]
    pub repbase_file: Option<PathBuf>,
    #[structopt(
        short,
        long = "out-prefix",
        help = "Prefix of the output files",
        parse(from_os_str)
    )]
    pub out_prefix: PathBuf,
    #[structopt(
        long = "write-parsed",
        help = "Write every locus and its filter status to <prefix>.parsed.txt.gz"
    )]
    pub write_parsed: bool,
    #[structopt(
        name = "bis-only",
        long = "bis-only",
        help = "Ignore the non-bisulfite counts, skipping the control thresholds"
    )]
    pub bis_only: bool,
    #[structopt(
        long = "min-del-obs",
        help = "Minimum deletions in the bisulfite sample",
        default_value = "5"
    )]
    pub min_del_obs: u32,
    #[structopt(
        long = "min-bis-cov",
        help = "Minimum coverage in the bisulfite sample",
        default_value = "10"
    )]
    pub min_bis_cov: u32,
    #[structopt(
        long = "min-bs-frac",
        help = "Minimum deletion fraction in the bisulfite sample",
        default_value = "0.005"
    )]
    pub min_bs_frac: f64,
    #[structopt(
        long = "min-nbs-cov",
        help = "Minimum coverage in the non-bisulfite sample",
        default_value = "10"
    )]
    pub min_nbs_cov: u32,
    #[structopt(
        long = "max-nbs-frac",
        help = "Maximum deletion fraction in the non-bisulfite sample",
        default_value = "0.01"
    )]
    pub max_nbs_frac: f64,
    #[structopt(
        long,
        help = "Length of the homopolymer and downstream base windows",
        default_value = "6"
    )]
    pub homopolymer: usize,
    #[structopt(
        long = "error-rate",
        help = "Background deletion rate of the binomial test",
        default_value = "0.001"
    )]
    pub error_rate: f64,
    #[structopt(
        long = "p-value",
        help = "Significance cutoff of the binomial tests",
        default_value = "0.05"
    )]
    pub p_value: f64,
    #[structopt(
        long = "split-thresh",
        help = "Split groups where the fraction drops below this share of the group maximum",
        default_value = "0.5"
    )]
    pub split_thresh: f64,
    #[structopt(
        long = "del-dist",
        help = "Distance to a non-bisulfite deletion site flagging a group as background",
        default_value = "5"
    )]
    pub del_dist: u64,
    #[structopt(
        long = "flank-dist",
        help = "Half width of the windows around exon boundaries",
        default_value = "4"
    )]
    pub flank_dist: u64,
    #[structopt(
        short,
        long,
        help = "Number of threads",
        default_value = "1"
    )]
    pub threads: usize,
    #[structopt(
        short,
        parse(from_occurrences),
        help = "Verbosity (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,
}

impl RustyPsi {
    pub fn set_logging(&self) {
        let log_level = match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        env_logger::Builder::new()
            .filter_level(log_level)
            .init();
    }

    /// Thresholds of the run, validated
    pub fn config(&self) -> Result<Config> {
        if self.parsed.is_none() && self.bis.is_none() {
            return Err(Error::ConfigError(
                "either --parsed or --bis has to be given".to_string(),
            ));
        }
        let config = Config {
            min_bs_del: self.min_del_obs,
            min_bs_cov: self.min_bis_cov,
            min_bs_frac: self.min_bs_frac,
            min_nbs_cov: self.min_nbs_cov,
            max_nbs_frac: self.max_nbs_frac,
            hp_length: self.homopolymer,
            error_rate: self.error_rate,
            pval: self.p_value,
            split_thresh: self.split_thresh,
            del_distance: self.del_dist,
            flank_length: self.flank_dist,
            has_control: !self.bis_only && (self.parsed.is_some() || self.non_bis.is_some()),
        };
        config.validate()?;
        Ok(config)
    }

    /// `<prefix><suffix>`
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let mut path = self.out_prefix.clone().into_os_string();
        path.push(suffix);
        PathBuf::from(path)
    }
}
