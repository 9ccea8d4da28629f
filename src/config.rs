use std::{
    collections::HashSet,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use super::{cli::cli_model, utils::init_log};

#[derive(Debug)]
pub struct Config {
    // Input BAM file (indexed) used for coverage estimation and annotation
    bam_file: PathBuf,
    // Input VCF files.  One output VCF (anno_<name>) is generated per input
    vcf_files: Vec<PathBuf>,
    // Chromosome allow-list.  None means no filtering; when set, records from
    // other chromosomes are skipped entirely (not written to the output)
    chromosomes: Option<HashSet<String>>,
    // Output directory.  If not set, outputs are placed alongside their inputs
    output_dir: Option<PathBuf>,
    // Seed for the coverage sampling RNG
    seed: u64,
    // Minimum MAPQ for a read to count towards unique coverage
    mapq_threshold: u8,
    // Number of VCF files to process in parallel
    threads: usize,
}

impl Config {
    pub fn bam_file(&self) -> &Path {
        self.bam_file.as_path()
    }
    pub fn vcf_files(&self) -> &[PathBuf] {
        &self.vcf_files
    }
    pub fn chromosomes(&self) -> Option<&HashSet<String>> {
        self.chromosomes.as_ref()
    }
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
    pub fn seed(&self) -> u64 {
        self.seed
    }
    pub fn mapq_threshold(&self) -> u8 {
        self.mapq_threshold
    }
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(
        bam_file: PathBuf,
        vcf_files: Vec<PathBuf>,
        chromosomes: Option<HashSet<String>>,
        output_dir: Option<PathBuf>,
        threads: usize,
    ) -> Self {
        Self {
            bam_file,
            vcf_files,
            chromosomes,
            output_dir,
            seed: 0,
            mapq_threshold: 20,
            threads,
        }
    }
}

pub fn handle_cli() -> anyhow::Result<Config> {
    // Get matches from command line
    let m = cli_model().get_matches();

    // Setup logging

    init_log(&m);

    debug!("Processing command line options");

    let bam_file = m
        .get_one::<PathBuf>("bam")
        .expect("Missing BAM file")
        .to_owned();

    if !bam_file.exists() {
        return Err(anyhow!("BAM file {} not found", bam_file.display()));
    }

    let vcf_files: Vec<_> = m
        .get_many::<PathBuf>("vcfs")
        .expect("Missing VCF files")
        .map(|p| p.to_owned())
        .collect();

    for p in vcf_files.iter() {
        if !p.exists() {
            return Err(anyhow!("VCF file {} not found", p.display()));
        }
    }

    // An empty chromosome list means no filtering
    let chromosomes = m
        .get_many::<String>("chromosomes")
        .map(|v| v.map(|s| s.to_owned()).collect::<HashSet<_>>())
        .filter(|s| !s.is_empty());

    let output_dir = m.get_one::<PathBuf>("workdir").map(|p| p.to_owned());

    let seed = *m.get_one::<u64>("seed").expect("Missing default seed value");

    let mapq_threshold = *m
        .get_one::<u8>("mapq_threshold")
        .expect("Missing default value");

    let threads = m
        .get_one::<NonZeroUsize>("threads")
        .map(|i| usize::from(*i))
        .unwrap_or(1);

    Ok(Config {
        bam_file,
        vcf_files,
        chromosomes,
        output_dir,
        seed,
        mapq_threshold,
        threads,
    })
}
