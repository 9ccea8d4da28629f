use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
    thread,
};

use anyhow::Context;
use crossbeam_channel::{unbounded, Receiver};
use rust_htslib::{
    bam::{self, Read as BamRead},
    bcf::{self, Read as BcfRead},
};

use super::{config::Config, estimate::CoverageEstimate};

// Records whose breakpoint span exceeds this are written through unannotated
const MAX_SV_SPAN: i64 = 1_000_000;

const INFO_UNIQ_COV: &[u8] = b"AA_UNIQ_COV";
const INFO_TOTAL_COV: &[u8] = b"AA_TOTAL_COV";

/// Annotate all input VCFs with coverage statistics from the BAM file.
///
/// Threading model
///
/// The coverage estimate is shared and read only, and each input file is
/// independent of the others, so when more than one thread is requested the
/// files are distributed over a pool of annotation threads.  Each thread opens
/// its own handle on the indexed BAM.
pub fn annotate_vcfs(cfg: &Config, est: &CoverageEstimate) -> anyhow::Result<()> {
    if let Some(dir) = cfg.output_dir() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Error creating output directory {}", dir.display()))?;
    }

    let nt = cfg.threads().min(cfg.vcf_files().len());
    if nt < 2 {
        for p in cfg.vcf_files() {
            annotate_vcf_file(cfg, est, p)?
        }
    } else {
        let (snd, rcv) = unbounded();
        let mut results = Vec::with_capacity(nt);
        thread::scope(|s| {
            let mut jh: Vec<_> = (0..nt)
                .map(|ix| {
                    let rc = rcv.clone();
                    s.spawn(move || annotate_thread(ix, cfg, est, rc))
                })
                .collect();

            // Send input files to the annotation threads
            for p in cfg.vcf_files() {
                snd.send(p)
                    .expect("Error sending VCF file to annotation threads")
            }

            // Signal that no more files are coming so that the threads will exit
            drop(snd);

            // Wait for annotation threads to finish and recover any errors
            for (ix, h) in jh.drain(..).enumerate() {
                let v = match h.join() {
                    Ok(r) => r,
                    Err(_) => {
                        error!("Annotation thread {} panicked", ix);
                        Err(anyhow!("Annotation thread {} panicked", ix))
                    }
                };
                results.push(v);
            }
        });

        for r in results {
            r?
        }
    }
    info!("Finished annotating {} VCF file(s)", cfg.vcf_files().len());
    Ok(())
}

fn annotate_thread(
    ix: usize,
    cfg: &Config,
    est: &CoverageEstimate,
    r: Receiver<&PathBuf>,
) -> anyhow::Result<()> {
    debug!("Annotation thread {} starting up", ix);
    for p in r.iter() {
        annotate_vcf_file(cfg, est, p)?
    }
    debug!("Annotation thread {} shutting down", ix);
    Ok(())
}

/// Annotate a single VCF file, writing anno_<name> with the full input header
/// plus the two coverage INFO keys.  Record order is preserved.
fn annotate_vcf_file(cfg: &Config, est: &CoverageEstimate, vcf_path: &Path) -> anyhow::Result<()> {
    let out_path = output_vcf_path(cfg, vcf_path)?;
    info!(
        "Annotating {} -> {}",
        vcf_path.display(),
        out_path.display()
    );

    let mut bam_rdr = bam::IndexedReader::from_path(cfg.bam_file()).with_context(|| {
        format!(
            "Error opening indexed BAM file {}",
            cfg.bam_file().display()
        )
    })?;

    let mut rdr = bcf::Reader::from_path(vcf_path)
        .with_context(|| format!("Error opening VCF file {}", vcf_path.display()))?;

    // Copy the input header and declare the coverage annotations
    let mut hdr = bcf::Header::from_template(rdr.header());
    hdr.push_record(br#"##INFO=<ID=AA_UNIQ_COV,Number=1,Type=Float,Description="Coverage over the breakpoint interval from reads at or above the MAPQ threshold, normalized by estimated mean coverage">"#);
    hdr.push_record(br#"##INFO=<ID=AA_TOTAL_COV,Number=1,Type=Float,Description="Coverage over the breakpoint interval from all overlapping reads, normalized by estimated mean coverage">"#);

    let mut wrtr = bcf::Writer::from_path(&out_path, &hdr, true, bcf::Format::Vcf)
        .with_context(|| format!("Error creating output VCF {}", out_path.display()))?;

    let mut n_rec = 0usize;
    let mut n_annotated = 0usize;
    let mut n_skipped = 0usize;
    let mut n_filtered = 0usize;

    for rec_res in rdr.records() {
        let mut rec = rec_res
            .with_context(|| format!("Error reading VCF record from {}", vcf_path.display()))?;
        n_rec += 1;
        wrtr.translate(&mut rec);

        let rid = rec.rid().ok_or_else(|| {
            anyhow!(
                "Record {} in {} has no chromosome",
                n_rec,
                vcf_path.display()
            )
        })?;
        let chrom = std::str::from_utf8(rec.header().rid2name(rid)?)?;

        // Records from chromosomes outside a non-empty allow-list are skipped
        // entirely (not written to the output)
        if cfg
            .chromosomes()
            .map(|set| !set.contains(chrom))
            .unwrap_or(false)
        {
            n_filtered += 1;
            continue;
        }

        // Breakpoint interval (0 based, half open).  end() honors INFO/END
        // for symbolic alleles
        let start = rec.pos();
        let end = rec.end();
        if end < start {
            return Err(anyhow!(
                "Record {} in {} has an inverted breakpoint interval",
                n_rec,
                vcf_path.display()
            ));
        }

        if end - start > MAX_SV_SPAN {
            // Span too large - emit the record without coverage annotations
            n_skipped += 1;
            wrtr.write(&rec)?;
            continue;
        }

        bam_rdr.fetch((chrom, start, end)).with_context(|| {
            format!(
                "Error fetching {}:{}-{} from BAM file (chromosome missing from index?)",
                chrom, start, end
            )
        })?;

        let mut unique_coverage = 0u64;
        let mut total_coverage = 0u64;
        for r in bam_rdr.records() {
            let brec = r.with_context(|| "Error reading BAM record")?;
            total_coverage += 1;
            if brec.mapq() >= cfg.mapq_threshold() {
                unique_coverage += 1
            }
        }

        let (uniq_cov, total_cov) =
            coverage_ratios(unique_coverage, total_coverage, est.mean_coverage());
        rec.push_info_float(INFO_UNIQ_COV, &[uniq_cov])?;
        rec.push_info_float(INFO_TOTAL_COV, &[total_cov])?;
        n_annotated += 1;
        wrtr.write(&rec)?;
    }

    info!(
        "{}: {} records read, {} annotated, {} skipped (span > {}), {} filtered out",
        vcf_path.display(),
        n_rec,
        n_annotated,
        n_skipped,
        MAX_SV_SPAN,
        n_filtered
    );
    Ok(())
}

/// Normalize raw coverage counts by the estimated mean coverage.  Values can
/// exceed 1.0; no clamping is applied.
fn coverage_ratios(unique_coverage: u64, total_coverage: u64, mean_coverage: f64) -> (f32, f32) {
    (
        (unique_coverage as f64 / mean_coverage) as f32,
        (total_coverage as f64 / mean_coverage) as f32,
    )
}

/// Output file is anno_<input name>, placed in the output directory if one was
/// given and otherwise alongside the input
fn output_vcf_path(cfg: &Config, vcf_path: &Path) -> anyhow::Result<PathBuf> {
    let name = vcf_path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid VCF file name {}", vcf_path.display()))?;
    let mut out_name = OsString::from("anno_");
    out_name.push(name);
    Ok(match cfg.output_dir() {
        Some(d) => d.join(out_name),
        None => vcf_path.with_file_name(out_name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use std::collections::HashSet;

    // 10 reads of length 10 starting at [120, 130), half uniquely mapped
    fn reads() -> Vec<(i64, u8)> {
        (0..10i64)
            .map(|i| (120 + i, if i % 2 == 0 { 30 } else { 10 }))
            .collect()
    }

    // num_read 5, cover_sum 10 -> mean coverage 2.0
    fn estimate() -> CoverageEstimate {
        CoverageEstimate::from_sums(5, 10, 1500.0, 225000.0).unwrap()
    }

    const RECORDS: &str = "chr1\t101\tsv1\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=200\n\
                           chr1\t301\tsv2\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=1000300\n\
                           chr1\t401\tsv3\tN\t<DEL>\t.\tPASS\tSVTYPE=DEL;END=1000401\n";

    #[test]
    fn annotates_small_spans_and_skips_large() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = test_utils::make_indexed_bam(dir.path(), &reads());
        let vcf_path = test_utils::make_vcf(dir.path(), "svs.vcf", RECORDS);
        let cfg = Config::new_for_tests(bam_path, vec![vcf_path.clone()], None, None, 1);

        annotate_vcf_file(&cfg, &estimate(), &vcf_path).unwrap();

        let out = dir.path().join("anno_svs.vcf");
        let mut rdr = bcf::Reader::from_path(&out).unwrap();
        let recs: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();

        // Record count and order preserved
        assert_eq!(recs.len(), 3);
        assert_eq!(
            recs.iter().map(|r| r.pos()).collect::<Vec<_>>(),
            vec![100, 300, 400]
        );

        // 10 overlapping reads, 5 with MAPQ >= 20, mean coverage 2.0
        let uniq = recs[0].info(INFO_UNIQ_COV).float().unwrap().unwrap();
        assert_eq!(uniq[0], 2.5);
        let total = recs[0].info(INFO_TOTAL_COV).float().unwrap().unwrap();
        assert_eq!(total[0], 5.0);

        // Span of exactly 1,000,000 is annotated (zero coverage here)
        let total = recs[1].info(INFO_TOTAL_COV).float().unwrap().unwrap();
        assert_eq!(total[0], 0.0);

        // Span of 1,000,001 is emitted without annotations
        assert!(recs[2].info(INFO_UNIQ_COV).float().unwrap().is_none());
        assert!(recs[2].info(INFO_TOTAL_COV).float().unwrap().is_none());
    }

    #[test]
    fn allow_list_drops_unlisted_chromosomes() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = test_utils::make_indexed_bam(dir.path(), &reads());
        let vcf_path = test_utils::make_vcf(dir.path(), "svs.vcf", RECORDS);
        let allow: HashSet<String> = std::iter::once("chr2".to_owned()).collect();
        let cfg = Config::new_for_tests(bam_path, vec![vcf_path.clone()], Some(allow), None, 1);

        annotate_vcf_file(&cfg, &estimate(), &vcf_path).unwrap();

        let mut rdr = bcf::Reader::from_path(dir.path().join("anno_svs.vcf")).unwrap();
        assert_eq!(rdr.records().count(), 0);
    }

    #[test]
    fn reruns_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = test_utils::make_indexed_bam(dir.path(), &reads());
        let vcf_path = test_utils::make_vcf(dir.path(), "svs.vcf", RECORDS);

        let mut outputs = Vec::new();
        for run in ["run1", "run2"] {
            let out_dir = dir.path().join(run);
            let cfg = Config::new_for_tests(
                bam_path.clone(),
                vec![vcf_path.clone()],
                None,
                Some(out_dir.clone()),
                1,
            );
            annotate_vcfs(&cfg, &estimate()).unwrap();
            outputs.push(fs::read(out_dir.join("anno_svs.vcf")).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn worker_pool_processes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = test_utils::make_indexed_bam(dir.path(), &reads());
        let vcf_a = test_utils::make_vcf(dir.path(), "a.vcf", RECORDS);
        let vcf_b = test_utils::make_vcf(dir.path(), "b.vcf", RECORDS);
        let out_dir = dir.path().join("out");
        let cfg = Config::new_for_tests(
            bam_path,
            vec![vcf_a, vcf_b],
            None,
            Some(out_dir.clone()),
            2,
        );

        annotate_vcfs(&cfg, &estimate()).unwrap();

        for name in ["anno_a.vcf", "anno_b.vcf"] {
            let mut rdr = bcf::Reader::from_path(out_dir.join(name)).unwrap();
            assert_eq!(rdr.records().count(), 3);
        }
    }

    #[test]
    fn failing_file_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let bam_path = test_utils::make_indexed_bam(dir.path(), &reads());
        let vcf_good = test_utils::make_vcf(dir.path(), "good.vcf", RECORDS);
        let vcf_bad = dir.path().join("missing.vcf");
        let cfg = Config::new_for_tests(
            bam_path,
            vec![vcf_good, vcf_bad],
            None,
            Some(dir.path().join("out")),
            2,
        );

        assert!(annotate_vcfs(&cfg, &estimate()).is_err());
    }

    #[test]
    fn ratios_are_not_clamped() {
        assert_eq!(coverage_ratios(5, 10, 2.0), (2.5, 5.0));
        assert_eq!(coverage_ratios(0, 0, 2.0), (0.0, 0.0));
    }
}
