use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use article_shards::RecordReader;
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "inspect_shard",
    about = "Print the records of a binary stream or shard"
)]
struct InspectCli {
    #[arg(value_name = "BIN", help = "Stream (`train.bin`) or shard (`train_000.bin`) file")]
    path: PathBuf,
    #[arg(long, default_value_t = 3, help = "Records to print before only counting")]
    show: usize,
    #[arg(long = "max-chars", default_value_t = 160, help = "Truncate printed fields")]
    max_chars: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = InspectCli::parse();
    let reader = RecordReader::new(BufReader::new(File::open(&cli.path)?));

    let mut records = 0usize;
    let mut bytes = 0usize;
    for frame in reader {
        let frame = frame?;
        bytes += frame.encoded_len();
        if records < cli.show {
            let example = frame.decode()?;
            println!("== record {records} ({} bytes) ==", frame.encoded_len());
            for feature in example.features() {
                for value in &feature.values {
                    let text = String::from_utf8_lossy(value);
                    let shown: String = text.chars().take(cli.max_chars).collect();
                    let ellipsis = if text.chars().count() > cli.max_chars { "..." } else { "" };
                    println!("  {}: {shown}{ellipsis}", feature.name);
                }
            }
        }
        records += 1;
    }

    println!("{}: {records} records, {bytes} bytes", cli.path.display());
    Ok(())
}
