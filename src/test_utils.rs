use std::{
    fs,
    path::{Path, PathBuf},
};

use rust_htslib::bam::{
    self,
    header::HeaderRecord,
    record::{Cigar, CigarString},
};

/// Write a coordinate sorted, indexed BAM with a single 3 Mb contig (chr1) and
/// the given (position, MAPQ) single end reads of length 10.  Positions must
/// be in ascending order.
pub(crate) fn make_indexed_bam(dir: &Path, reads: &[(i64, u8)]) -> PathBuf {
    let mut header = bam::Header::new();
    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 3_000_000);
    header.push_record(&sq);

    let path = dir.join("reads.bam");
    {
        let mut wrtr = bam::Writer::from_path(&path, &header, bam::Format::Bam).unwrap();
        for (i, (pos, mapq)) in reads.iter().enumerate() {
            let qname = format!("read{}", i);
            let cigar = CigarString(vec![Cigar::Match(10)]);
            let mut rec = bam::Record::new();
            rec.set(qname.as_bytes(), Some(&cigar), b"ACGTACGTAC", &[30u8; 10]);
            rec.set_tid(0);
            rec.set_pos(*pos);
            rec.set_mapq(*mapq);
            rec.set_insert_size(150);
            wrtr.write(&rec).unwrap();
        }
    }
    bam::index::build(&path, None, bam::index::Type::Bai, 1).unwrap();
    path
}

/// Write a VCF with a fixed header (chr1, SVTYPE and END declared) and the
/// given record lines
pub(crate) fn make_vcf(dir: &Path, name: &str, records: &str) -> PathBuf {
    let path = dir.join(name);
    let txt = format!(
        "##fileformat=VCFv4.2\n\
         ##contig=<ID=chr1,length=3000000>\n\
         ##INFO=<ID=SVTYPE,Number=1,Type=String,Description=\"Type of structural variant\">\n\
         ##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position of the variant\">\n\
         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n{}",
        records
    );
    fs::write(&path, txt).unwrap();
    path
}
