use std::{num::NonZeroUsize, path::PathBuf};

use clap::{command, value_parser, Arg, ArgAction, Command};

use super::utils::LogLevel;

pub fn cli_model() -> Command {
    command!()
        .arg(
            Arg::new("timestamp")
                .short('X')
                .long("timestamp")
                .value_parser(value_parser!(stderrlog::Timestamp))
                .value_name("GRANULARITY")
                .default_value("none")
                .help("Prepend log entries with a timestamp"),
        )
        .arg(
            Arg::new("loglevel")
                .short('l')
                .long("loglevel")
                .value_name("LOGLEVEL")
                .value_parser(value_parser!(LogLevel))
                .ignore_case(true)
                .default_value("info")
                .help("Set log level"),
        )
        .arg(
            Arg::new("quiet")
                .action(ArgAction::SetTrue)
                .long("quiet")
                .conflicts_with("loglevel")
                .help("Silence all output"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_parser(value_parser!(NonZeroUsize))
                .value_name("INT")
                .help("Number of VCF files to process in parallel [default: 1]"),
        )
        .arg(
            Arg::new("seed")
                .short('S')
                .long("seed")
                .value_parser(value_parser!(u64))
                .value_name("SEED")
                .default_value("0")
                .help("Random number seed for coverage sampling"),
        )
        .arg(
            Arg::new("mapq_threshold")
                .short('q')
                .long("mapq-threshold")
                .value_parser(value_parser!(u8))
                .value_name("QUAL")
                .default_value("20")
                .help("Minimum mapping quality for a read to count as uniquely mapped"),
        )
        .arg(
            Arg::new("chromosomes")
                .short('c')
                .long("chromosomes")
                .value_parser(value_parser!(String))
                .value_name("CHROM")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Only process records from these chromosomes [default: all]"),
        )
        .arg(
            Arg::new("workdir")
                .short('w')
                .long("workdir")
                .value_parser(value_parser!(PathBuf))
                .value_name("DIR")
                .help("Directory for output VCFs [default: alongside each input]"),
        )
        .arg(
            Arg::new("bam")
                .short('b')
                .long("bam")
                .value_parser(value_parser!(PathBuf))
                .value_name("BAM_FILE")
                .required(true)
                .help("Input BAM file (must be indexed)"),
        )
        .arg(
            Arg::new("vcfs")
                .value_parser(value_parser!(PathBuf))
                .value_name("VCF_FILE")
                .num_args(1..)
                .required(true)
                .help("Input VCF files"),
        )
}
