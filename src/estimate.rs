use anyhow::Context;
use rand::{distributions::Uniform, prelude::*};
use rust_htslib::bam::{self, Read};
use thiserror::Error;

// Number of sampled positions used for the coverage estimate
const READ_LIMIT: usize = 1000;

// Positions are sampled uniformly from [0, SAMPLE_REGION_LEN) on the first
// reference sequence.  Positions beyond the end of the sequence yield empty
// fetches and are not counted.
const SAMPLE_REGION_LEN: i64 = 30_000_000;

/// Degenerate sampling - reported distinctly from input errors so that a run
/// never continues with undefined statistics
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    #[error("no coverage data: no sampled position overlapped an alignment")]
    NoCoverageData,
}

/// Coverage statistics estimated from randomly sampled positions.
/// Computed once per run and immutable thereafter.
#[derive(Debug, Clone, Copy)]
pub struct CoverageEstimate {
    mean_coverage: f64,
    mean_insert_size: f64,
    sd_insert_size: f64,
}

impl CoverageEstimate {
    pub fn mean_coverage(&self) -> f64 {
        self.mean_coverage
    }
    pub fn mean_insert_size(&self) -> f64 {
        self.mean_insert_size
    }
    pub fn sd_insert_size(&self) -> f64 {
        self.sd_insert_size
    }

    /// Derive the estimate from accumulated sums.  num_read is the number of
    /// sampled positions that overlapped at least one alignment, cover_sum the
    /// total number of alignments seen at those positions.
    pub(crate) fn from_sums(
        num_read: u64,
        cover_sum: u64,
        insert_sum: f64,
        insert_sq_sum: f64,
    ) -> Result<Self, EstimateError> {
        if num_read == 0 || cover_sum == 0 {
            return Err(EstimateError::NoCoverageData);
        }
        let mean_coverage = cover_sum as f64 / num_read as f64;
        let mean_insert_size = insert_sum / cover_sum as f64;
        let var = insert_sq_sum / cover_sum as f64 - mean_insert_size * mean_insert_size;
        Ok(Self {
            mean_coverage,
            mean_insert_size,
            sd_insert_size: var.max(0.0).sqrt(),
        })
    }
}

/// Estimate mean coverage and template size statistics by fetching alignments
/// at randomly sampled single base positions on the first reference sequence.
/// mean_coverage is the mean number of alignments found per successful sampled
/// position (not a per-base depth).
pub fn estimate_coverage(
    rdr: &mut bam::IndexedReader,
    rng: &mut impl Rng,
) -> anyhow::Result<CoverageEstimate> {
    if rdr.header().target_count() == 0 {
        return Err(anyhow!("BAM file has no reference sequences"));
    }
    let first_ctg = String::from_utf8_lossy(rdr.header().target_names()[0]).into_owned();
    debug!("Sampling coverage on first reference sequence {}", first_ctg);

    let pos_dist = Uniform::from(0..SAMPLE_REGION_LEN);

    let mut num_read = 0u64;
    let mut cover_sum = 0u64;
    let mut insert_sum = 0.0f64;
    let mut insert_sq_sum = 0.0f64;

    for _ in 0..READ_LIMIT {
        let loc = rng.sample(pos_dist);
        rdr.fetch((0i32, loc, loc + 1))
            .with_context(|| format!("Error fetching {}:{} from BAM file", first_ctg, loc))?;

        let mut found = false;
        for r in rdr.records() {
            let rec = r.with_context(|| "Error reading BAM record")?;
            let tlen = rec.insert_size() as f64;
            cover_sum += 1;
            insert_sum += tlen;
            insert_sq_sum += tlen * tlen;
            found = true;
        }
        // Positions with no overlapping alignments do not count towards num_read
        if found {
            num_read += 1;
        }
    }

    let est = CoverageEstimate::from_sums(num_read, cover_sum, insert_sum, insert_sq_sum)?;
    info!("Estimated coverage mean: {:.4}", est.mean_coverage());
    info!("Estimated template size mean: {:.4}", est.mean_insert_size());
    info!("Estimated template size sd: {:.4}", est.sd_insert_size());
    Ok(est)
}
