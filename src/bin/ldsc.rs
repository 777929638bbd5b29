use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use ldscore::ldsc::{DEFAULT_N_BLOCKS, LdscConfig, estimate_h2, estimate_rg};
use ldscore::logging::{LogSink, init_tracing};
use ldscore::regressions::JackknifeEstimator;

#[derive(Parser)]
#[command(name = "ldsc")]
#[command(about = "LD Score regression for heritability and genetic correlation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Heritability, partitioned when the reference LD Scores have several columns.
    H2 {
        sumstats: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Genetic correlation of the first phenotype with each of the others.
    Rg {
        /// Comma-separated summary-statistics files.
        phenotypes: String,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(long)]
    ref_ld: Option<String>,
    /// Chromosome-split reference LD Scores; `@` marks the chromosome number.
    #[arg(long)]
    ref_ld_chr: Option<String>,
    #[arg(long)]
    w_ld: Option<String>,
    #[arg(long)]
    w_ld_chr: Option<String>,
    #[arg(long)]
    overlap_annot: bool,
    #[arg(long)]
    frqfile: Option<String>,
    #[arg(long)]
    frqfile_chr: Option<String>,
    #[arg(long = "M")]
    m: Option<String>,
    #[arg(long = "not-M-5-50")]
    not_m_5_50: bool,
    #[arg(long, default_value_t = DEFAULT_N_BLOCKS)]
    n_blocks: usize,
    /// One value for h2; three for rg (h2 of each phenotype, then gencov).
    #[arg(long)]
    constrain_intercept: Option<String>,
    #[arg(long)]
    no_check_alleles: bool,
    #[arg(long)]
    invert_anyway: bool,
    #[arg(long)]
    no_check: bool,
    #[arg(long)]
    print_coefficients: bool,
    #[arg(long)]
    print_cov: bool,
    #[arg(long)]
    print_delete_vals: bool,
    #[arg(long, default_value = "ldsc")]
    out: String,
}

impl CommonArgs {
    fn into_config(self) -> anyhow::Result<LdscConfig> {
        let constrain_intercept = self
            .constrain_intercept
            .map(parse_f64_list)
            .transpose()?
            .unwrap_or_default();
        Ok(LdscConfig {
            ref_ld: self.ref_ld,
            ref_ld_chr: self.ref_ld_chr,
            w_ld: self.w_ld,
            w_ld_chr: self.w_ld_chr,
            overlap_annot: self.overlap_annot,
            frqfile: self.frqfile,
            frqfile_chr: self.frqfile_chr,
            m: self.m,
            not_m_5_50: self.not_m_5_50,
            n_blocks: self.n_blocks,
            constrain_intercept,
            no_check_alleles: self.no_check_alleles,
            invert_anyway: self.invert_anyway,
            no_check: self.no_check,
            print_coefficients: self.print_coefficients,
            print_cov: self.print_cov,
            print_delete_vals: self.print_delete_vals,
            out: self.out,
        })
    }
}

enum Job {
    H2(PathBuf),
    Rg(Vec<PathBuf>),
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (job, config) = match cli.command {
        Command::H2 { sumstats, common } => (Job::H2(sumstats), common.into_config()?),
        Command::Rg { phenotypes, common } => {
            let paths = split_string_list(&phenotypes)
                .into_iter()
                .map(PathBuf::from)
                .collect();
            (Job::Rg(paths), common.into_config()?)
        }
    };

    let log_path = config.out_path(".log");
    let mut log = LogSink::to_file(&log_path)?;
    log.log_line(&format!(
        "Beginning analysis; log written to {}",
        log_path.display()
    ))?;
    let result = match &job {
        Job::H2(sumstats) => estimate_h2(sumstats, &config, &JackknifeEstimator, &mut log).map(|_| ()),
        Job::Rg(paths) => estimate_rg(paths, &config, &JackknifeEstimator, &mut log).map(|_| ()),
    };
    if let Err(err) = &result {
        log.log_line(&format!("Analysis failed: {err:#}"))?;
    }
    log.flush()?;
    result
}

fn split_string_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_f64_list(input: String) -> anyhow::Result<Vec<f64>> {
    split_string_list(&input)
        .into_iter()
        .map(|s| {
            s.parse::<f64>()
                .with_context(|| format!("could not parse {s:?} as a number"))
        })
        .collect()
}
