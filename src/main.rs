use clap::{Parser, Subcommand};
use gzseek::index::DEFAULT_CHUNK_SIZE;
use gzseek::{deflate_start, seek_entry, verify_reverse, DeflateIndex, EntryReader, Inflater};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gzseek", version = "1.0.0", about = "Random-access indexing for gzip streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index over a gzip file and print a summary
    Index {
        input: PathBuf,
        /// Uncompressed bytes between index points
        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Print every entry point
        #[arg(short, long)]
        verbose: bool,
    },
    /// Build an index, then re-decode every entry point in reverse order
    Check {
        input: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Decompress LENGTH bytes starting at uncompressed position OFFSET
    Cat {
        input: PathBuf,
        offset: u64,
        length: u64,
        #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        // ── Index ────────────────────────────────────────────────────────────
        Commands::Index { input, chunk_size, verbose } => {
            let mut file = File::open(&input)?;
            let start = deflate_start(&mut file)?;
            let (index, data) = DeflateIndex::build(&mut file, start, chunk_size)?;

            println!("── gzip index ───────────────────────────────────────────");
            println!("  Input            {}", input.display());
            println!("  Deflate payload  byte {start} onward");
            println!("  Uncompressed     {} B", data.len());
            println!("  Chunk size       {} B", index.chunk_size);
            println!("  Entry points     {}", index.len());

            if verbose {
                println!();
                println!("{:>6}  {:>12}  {:>12}  {:>12}  {:>7}  {:>5}",
                         "entry", "output", "head bit", "start bit", "offset", "last");
                for (k, p) in index.points.iter().enumerate() {
                    let head = p.head.map(|h| h.to_string()).unwrap_or_else(|| "-".into());
                    println!("{k:>6}  {:>12}  {head:>12}  {:>12}  {:>7}  {:>5}",
                             k as u64 * index.chunk_size as u64, p.start, p.offset, p.last);
                }
            }
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { input, chunk_size } => {
            let mut file = File::open(&input)?;
            let start = deflate_start(&mut file)?;
            let (index, data) = DeflateIndex::build(&mut file, start, chunk_size)?;
            let checked = verify_reverse(&mut file, &index, &data)?;
            println!("{checked} entry points generated and successfully tested");
        }

        // ── Cat ──────────────────────────────────────────────────────────────
        Commands::Cat { input, offset, length, chunk_size } => {
            let mut file = File::open(&input)?;
            let start = deflate_start(&mut file)?;
            let (index, data) = DeflateIndex::build(&mut file, start, chunk_size)?;
            if offset >= data.len() as u64 {
                return Err(format!(
                    "offset {offset} is past the end of the stream ({} B)",
                    data.len()
                )
                .into());
            }

            let entry = index.entry_for(offset);
            let mut codec = Inflater::raw()?;
            seek_entry(&mut codec, &mut file, &index, entry, &data)?;
            let mut reader = EntryReader::new(&mut codec, &mut file);
            let mut scratch = vec![0u8; 8192];

            // Drop the part of the chunk that precedes the requested offset.
            let mut skip = (offset - entry as u64 * index.chunk_size as u64) as usize;
            while skip > 0 {
                let n = reader.read_into(&mut scratch[..skip.min(8192)])?;
                if n == 0 {
                    break;
                }
                skip -= n;
            }

            let stdout = io::stdout();
            let mut stdout = stdout.lock();
            let mut remaining = length.min(data.len() as u64 - offset) as usize;
            while remaining > 0 {
                let n = reader.read_into(&mut scratch[..remaining.min(8192)])?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&scratch[..n])?;
                remaining -= n;
            }
            stdout.flush()?;
        }
    }

    Ok(())
}
