use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use trajlstm::ingest::iff::{count_rows, output_name, write_plan_changes, write_track, IffReader};

#[derive(Parser, Debug)]
#[command(about = "extract flight plan changes and track points of one flight from an IFF file")]
struct Args {
    /// IFF csv file
    file: PathBuf,

    /// callsign of the flight to extract
    #[arg(short, long)]
    callsign: String,

    /// date tag used in output file names, e.g. 20170406
    #[arg(short, long)]
    date: String,

    /// number of rows per chunk
    #[arg(long, default_value_t = 1_000_000)]
    chunk_size: usize,

    /// output directory
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// only count the rows of the file
    #[arg(long)]
    count: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.count {
        println!("loaded {} rows of data", count_rows(&args.file)?);
        return Ok(());
    }

    let extract = IffReader::new(&args.file, args.chunk_size).read_flight(&args.callsign)?;

    std::fs::create_dir_all(&args.out_dir)?;
    let track_file = args.out_dir.join(output_name(&args.callsign, &args.date, "csv"));
    let plan_file = args.out_dir.join(output_name(&args.callsign, &args.date, "trx"));

    write_track(&track_file, &extract.track)?;
    write_plan_changes(&plan_file, &extract.plan_changes)?;

    println!("{} track points -> {}", extract.track.len(), track_file.display());
    println!("{} flight plan changes -> {}", extract.plan_changes.len(), plan_file.display());

    Ok(())
}
