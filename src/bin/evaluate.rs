use anyhow::Result;
use burn::backend::NdArray;
use burn::config::Config;
use burn::tensor::backend::Backend;
use clap::Parser;
use std::path::PathBuf;

use trajlstm::evaluation::{evaluate, EvaluationConfig};

type EvalBackend = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(about = "evaluate a weather conditioned trajectory model against flight plans")]
struct Args {
    /// evaluation config (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// directory to store predicted, true and flight plan trajectories
    #[arg(short, long)]
    output_dir: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = EvaluationConfig::load(&args.config)?;
    if args.output_dir.is_some() {
        config.output_dir = args.output_dir;
    }

    let device = <EvalBackend as Backend>::Device::default();
    let evaluation = evaluate::<EvalBackend>(&config, device)?;

    println!("#########################################################");
    println!("loss: {:.6}", evaluation.loss);
    println!("{}", evaluation.report);
    println!("#########################################################");

    Ok(())
}
