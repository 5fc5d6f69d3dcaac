use crate::config::Config;
use crate::group::PositionGroup;
use crate::pipeline::RunSummary;
use crate::Result;
use log::info;
use std::io::Write;

/// Columns of the results table
pub const HEADER: [&str; 21] = [
    "Chrom",
    "PositionCall",
    "PositionT",
    "PositionAll",
    "PositionCount",
    "Strand",
    "Base",
    "BSDepth",
    "BSDel",
    "BSFraction",
    "BSPval",
    "BSQval",
    "NBSDepth",
    "NBSDel",
    "NBSFraction",
    "NBSPval",
    "FilterFlag",
    "QvalueFlag",
    "BaseFlag",
    "Gene",
    "Biotype",
];

/// Result line of a group, coordinates 1-based
pub fn format_row(group: &PositionGroup) -> String {
    let rep = group.representative();
    let all = group
        .positions()
        .iter()
        .map(|p| (p.pos + 1).to_string())
        .collect::<Vec<_>>()
        .join(";");
    let pred_pos = rep
        .pred_pos
        .map_or_else(|| "NA".to_string(), |pos| (pos + 1).to_string());
    let qval = group
        .qval
        .map_or_else(|| "NA".to_string(), |q| format!("{:.6}", q));
    let qval_flag = match group.qval_pass {
        Some(true) => "OK",
        Some(false) => "qvalue",
        None => "NA",
    };
    let base_flag = rep
        .base_flag
        .map_or_else(|| "NA".to_string(), |flag| flag.to_string());

    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{}\t{}\t{}\t{:.6}\t{:.6}\t{}\t{}\t{}\t{}\t{}",
        rep.chrom,
        rep.pos + 1,
        pred_pos,
        all,
        group.len(),
        rep.strand,
        rep.reported_base() as char,
        rep.bs_depth,
        rep.bs_del,
        rep.bs_frac,
        group.bs_pval,
        qval,
        rep.nbs_depth,
        rep.nbs_del,
        rep.nbs_frac,
        group.nbs_pval,
        group.filter,
        qval_flag,
        base_flag,
        group.gene_name,
        group.biotype
    )
}

/// Writes the header and one line per group
pub fn write_results<W: Write>(mut out: W, groups: &[PositionGroup]) -> Result<()> {
    writeln!(out, "{}", HEADER.join("\t"))?;
    for group in groups {
        writeln!(out, "{}", format_row(group))?;
    }
    out.flush()?;
    Ok(())
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

/// Logs the per stage tallies
pub fn log_summary(summary: &RunSummary, config: &Config) {
    let filter = &summary.filter;
    let total = filter.total;
    info!("******* Threshold Filtering ******");
    info!("{} positions processed", total);
    info!(
        "Fewer than {} deletions in bisulfite sample: {} ({:.4}%)",
        config.min_bs_del,
        filter.min_del_bs,
        percent(filter.min_del_bs, total)
    );
    info!(
        "Fewer than {} coverage in bisulfite sample: {} ({:.4}%)",
        config.min_bs_cov,
        filter.min_bs_cov,
        percent(filter.min_bs_cov, total)
    );
    info!(
        "Deletion rate lower than {:.4} in bisulfite sample: {} ({:.4}%)",
        config.min_bs_frac,
        filter.min_bs_frac,
        percent(filter.min_bs_frac, total)
    );
    if config.has_control {
        info!(
            "Fewer than {} coverage in non-bisulfite sample: {} ({:.4}%)",
            config.min_nbs_cov,
            filter.min_nbs_cov,
            percent(filter.min_nbs_cov, total)
        );
        info!(
            "Deletion rate higher than {:.4} in non-bisulfite sample: {} ({:.4}%)",
            config.max_nbs_frac,
            filter.max_nbs_frac,
            percent(filter.max_nbs_frac, total)
        );
    }
    info!(
        "Passing positions: {} ({:.4}%)",
        filter.passed,
        percent(filter.passed, total)
    );
    info!(
        "Positions after collapsing: {} ({:.4}%)",
        summary.after_collapse,
        percent(summary.after_collapse, filter.passed)
    );

    let groups = summary.after_collapse;
    info!("******* Artifact and Confidence Filtering ******");
    info!(
        "Low confidence (pval {:.4}): {} ({:.4}%)",
        config.pval,
        summary.low_confidence,
        percent(summary.low_confidence, groups)
    );
    info!(
        "High background exact (pval {:.4}): {} ({:.4}%)",
        config.pval,
        summary.high_background_exact,
        percent(summary.high_background_exact, groups)
    );
    info!(
        "High background proximity ({} bp): {} ({:.4}%)",
        config.del_distance,
        summary.high_background_prox,
        percent(summary.high_background_prox, groups)
    );
    info!(
        "Homopolymer ({} bp): {} ({:.4}%)",
        config.hp_length,
        summary.homopolymer,
        percent(summary.homopolymer, groups)
    );
    info!(
        "Splice junction ({} bp): {} ({:.4}%)",
        config.flank_length,
        summary.in_flank,
        percent(summary.in_flank, groups)
    );
    let ready = summary.annotation_ready();
    info!("Annotation ready: {} ({:.4}%)", ready, percent(ready, groups));

    info!("******* Annotation ******");
    info!(
        "Annotated: {} ({:.4}%)",
        summary.annotated,
        percent(summary.annotated, ready)
    );
    info!(
        "Unannotated: {} ({:.4}%)",
        summary.unannotated,
        percent(summary.unannotated, ready)
    );
    info!(
        "Shared originating T all: {} ({:.4}%)",
        summary.shared_all,
        percent(summary.shared_all, ready)
    );
    info!(
        "Shared originating T usable: {} ({:.4}%)",
        summary.shared_usable,
        percent(summary.shared_usable, ready)
    );

    info!("******* Qvalue ******");
    info!("Corrected positions: {}", summary.corrected);
    info!(
        "qvalue passed: {} ({:.4}%)",
        summary.qvalue_passed,
        percent(summary.qvalue_passed, summary.corrected)
    );
}
