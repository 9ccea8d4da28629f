#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod annotate;
mod cli;
mod config;
mod estimate;
#[cfg(test)]
mod test_utils;
mod utils;

use anyhow::Context;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;
use rust_htslib::bam;

fn main() -> anyhow::Result<()> {
    // Set up configuration from CLI
    let cfg = config::handle_cli()?;
    debug!("{:?}", cfg);

    // Estimate mean coverage from the BAM by random position sampling.  The
    // estimate is computed once and shared (read only) by the annotation pass.
    let mut rdr = bam::IndexedReader::from_path(cfg.bam_file()).with_context(|| {
        format!(
            "Error opening indexed BAM file {}",
            cfg.bam_file().display()
        )
    })?;
    let mut rng = Pcg64Mcg::seed_from_u64(cfg.seed());
    let est = estimate::estimate_coverage(&mut rdr, &mut rng)?;
    drop(rdr);

    // Annotate input VCFs
    annotate::annotate_vcfs(&cfg, &est)
}
