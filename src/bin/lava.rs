use anyhow::Result;
use clap::Parser;

use lava::cli::opts::{Cli, Command};
use lava::lava::dictgen::build_dicts;
use lava::lava::genotype::genotype;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("{:?}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Dict {
            ref_fasta,
            snps,
            out_ref_dict,
            out_snp_dict,
        } => build_dicts(&ref_fasta, &snps, &out_ref_dict, &out_snp_dict),
        Command::Lava {
            ref_dict,
            snp_dict,
            fastq,
            chrlens,
            out,
        } => {
            genotype(&ref_dict, &snp_dict, &fastq, &chrlens, &out)?;
            Ok(())
        }
    }
}
