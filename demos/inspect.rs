use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::eyre;
use log::info;

use spn_rs::circuit::Circuit;
use spn_rs::dump::DumpConfig;
use spn_rs::varset::VarSet;

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Circuit file written by `Circuit::save`.
    #[arg(value_name = "FILE")]
    path: PathBuf,

    /// Observed variable, as `VAR=VALUE` (may be repeated).
    #[clap(short, long, value_name = "VAR=VALUE")]
    evidence: Vec<String>,

    /// Also compute the most probable explanation.
    #[clap(long)]
    map: bool,

    /// Print the text dump with the given precision.
    #[clap(long, value_name = "INT")]
    dump: Option<usize>,
}

fn parse_evidence(items: &[String]) -> color_eyre::Result<VarSet> {
    let mut evidence = VarSet::new();
    for item in items {
        let (var, value) = item
            .split_once('=')
            .ok_or_else(|| eyre!("evidence must look like VAR=VALUE, got '{}'", item))?;
        let var: u32 = var.trim().parse()?;
        let value: usize = value.trim().parse()?;
        evidence.insert(var.into(), value);
    }
    Ok(evidence)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let (c, root) = Circuit::load(&args.path)?;
    info!("Loaded {:?} from {}", c, args.path.display());

    let counts = c.count_nodes(root);
    println!(
        "sums = {}, products = {}, leaves = {}, edges = {}",
        counts.sums,
        counts.products,
        counts.leaves,
        c.num_edges(root)
    );
    println!("height = {}", c.height(root)?);
    println!("parameters = {}", c.num_parameters(root));
    println!("induced trees = {}", c.count_induced_trees(root)?);
    if let Err(e) = c.validate(root) {
        println!("warning: {}", e);
    }

    let evidence = parse_evidence(&args.evidence)?;
    let lp = c.evaluate(root, &evidence)?;
    println!("log P(evidence) = {:.6} (P = {:.6})", lp, lp.exp());

    if args.map {
        let (assignment, value) = c.evaluate_map(root, &evidence)?;
        for (var, x) in assignment.iter() {
            println!("  {} = {}", var, x);
        }
        println!("MAP log value = {:.6}", value);
    }

    if let Some(precision) = args.dump {
        print!("{}", c.to_text_with_config(root, &DumpConfig { precision }));
    }

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
