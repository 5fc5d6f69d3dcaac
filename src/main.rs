#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Scores likely pseudouridine positions from bisulfite induced deletions.
mod cli;

use log::{info, warn};
use rustypsi::annotation::AnnotationBuilder;
use rustypsi::error::Error;
use rustypsi::genomic::Reference;
use rustypsi::input::{MergedLoci, ParsedLoci, SampleLocus, SampleLoci};
use rustypsi::locus::LocusObservation;
use rustypsi::pipeline::Pipeline;
use rustypsi::report::{log_summary, write_results};
use rustypsi::Result;
use std::io::Write;
use structopt::StructOpt;

fn main() -> Result<()> {
    let opt = cli::RustyPsi::from_args();
    opt.set_logging();
    let config = opt.config()?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads)
        .build_global()
        .or_else(|_| Err(Error::ThreadError))?;

    let mut builder = AnnotationBuilder::new();
    if let Some(ref path) = opt.biomart_file {
        builder.read_biomart(path)?;
    }
    builder.read_gene_table(&opt.ann_file, config.flank_length)?;
    let reference = Reference::from_path(&opt.ref_file)?;
    if let Some(ref path) = opt.repbase_file {
        builder.read_repeats(path)?;
    }
    let annotation = builder.build();

    let loci: Box<dyn Iterator<Item = Result<LocusObservation>> + '_> =
        match (&opt.parsed, &opt.bis, &opt.non_bis) {
            (Some(parsed), _, _) => {
                info!("Reading in pre-parsed file {}", parsed.display());
                Box::new(ParsedLoci::from_path(parsed)?)
            }
            (None, Some(bis), Some(non_bis)) => {
                info!("Parsing bisulfite and non-bisulfite tables");
                Box::new(MergedLoci::new(
                    SampleLoci::from_path(bis)?,
                    SampleLoci::from_path(non_bis)?,
                    &reference,
                ))
            }
            (None, Some(bis), None) => {
                info!("Parsing bisulfite table");
                Box::new(MergedLoci::new(
                    SampleLoci::from_path(bis)?,
                    std::iter::empty::<Result<SampleLocus>>(),
                    &reference,
                ))
            }
            (None, None, _) => {
                return Err(Error::ConfigError(
                    "either --parsed or --bis has to be given".to_string(),
                ))
            }
        };
    let bis_only = opt.bis_only;
    let loci = loci.map(move |locus| {
        locus.map(|locus| {
            if bis_only {
                locus.without_control()
            } else {
                locus
            }
        })
    });

    let audit_path = opt.output_path(".parsed.txt.gz");
    let audit_tmp = opt.output_path(".parsed.txt.gz.tmp");
    let mut audit = if opt.write_parsed {
        Some(niffler::to_path(
            &audit_tmp,
            niffler::compression::Format::Gzip,
            niffler::Level::Six,
        )?)
    } else {
        None
    };

    let pipeline = Pipeline::new(&config, &reference, &annotation);
    let outcome = pipeline.run(loci, audit.as_mut().map(|w| w as &mut dyn Write));
    let (groups, summary) = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if audit.take().is_some() && std::fs::remove_file(&audit_tmp).is_err() {
                warn!("Could not remove {}", audit_tmp.display());
            }
            return Err(e);
        }
    };

    let results_path = opt.output_path(".results.txt");
    let results_tmp = opt.output_path(".results.txt.tmp");
    info!("Writing results to {}...", results_path.display());
    let written = std::fs::File::create(&results_tmp)
        .map_err(Error::from)
        .and_then(|file| write_results(std::io::BufWriter::new(file), &groups));
    if let Err(e) = written {
        if std::fs::remove_file(&results_tmp).is_err() {
            warn!("Could not remove {}", results_tmp.display());
        }
        return Err(e);
    }
    std::fs::rename(&results_tmp, &results_path)?;

    if let Some(mut audit) = audit.take() {
        audit.flush()?;
        drop(audit);
        std::fs::rename(&audit_tmp, &audit_path)?;
        info!("Wrote parsed loci to {}", audit_path.display());
    }

    log_summary(&summary, &config);
    info!("Finished!");
    Ok(())
}
