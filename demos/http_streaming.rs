//! Example: Parallel Chunked Download
//!
//! Streams a local file or an HTTP object through a `ParallelChunkReader` and
//! writes the bytes, in order, to a file or stdout.
//!
//! # Usage
//!
//! ```bash
//! # With a local file (for testing)
//! cargo run --example http_streaming -- local path/to/file.bin out.bin
//!
//! # With an HTTP URL, 8 workers, 1 MiB chunks
//! BLOBSTREAM_PARALLELISM=8 BLOBSTREAM_CHUNK_SIZE=1048576 \
//!     cargo run --example http_streaming -- http https://cdn.example.com/large.bin out.bin
//!
//! # Verbose logging
//! RUST_LOG=blobstream=debug cargo run --example http_streaming -- http https://... -
//! ```

use blobstream::{
    open_url, ChunkReaderConfig, HttpConfig, LocalFileSource, ParallelChunkReader,
};
use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: http_streaming <local|http> <path_or_url> [output|-]");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  http_streaming local ./data/large.bin copy.bin");
        eprintln!("  http_streaming http https://cdn.example.com/large.bin -");
        std::process::exit(1);
    }

    let mode = &args[1];
    let source_path = &args[2];
    let output = args.get(3).map(String::as_str).unwrap_or("-");
    let config = config_from_env()?;

    let reader = match mode.as_str() {
        "local" => ParallelChunkReader::from_source(LocalFileSource::open(source_path)?, config)?,
        "http" => open_url(source_path.as_str(), HttpConfig::default(), config)?,
        _ => {
            eprintln!("Unknown mode: {mode}. Use 'local' or 'http'.");
            std::process::exit(1);
        }
    };

    eprintln!("Source:      {}", reader.source_id());
    eprintln!("Size:        {} bytes", reader.total_len());
    eprintln!(
        "Chunks:      {} x {} bytes",
        reader.chunk_count(),
        reader.chunk_size()
    );
    eprintln!("Workers:     {}", reader.worker_count());

    let started = Instant::now();
    let copied = if output == "-" {
        copy_to(&reader, io::stdout().lock())?
    } else {
        copy_to(&reader, File::create(output)?)?
    };
    reader.close()?;

    let elapsed = started.elapsed();
    eprintln!(
        "Copied:      {copied} bytes in {:.2?} ({:.1} MiB/s)",
        elapsed,
        copied as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn copy_to<W: Write>(reader: &ParallelChunkReader, sink: W) -> io::Result<u64> {
    let mut sink = BufWriter::new(sink);
    let mut source = reader;
    let copied = io::copy(&mut source, &mut sink)?;
    sink.flush()?;
    Ok(copied)
}

fn config_from_env() -> Result<ChunkReaderConfig, Box<dyn std::error::Error>> {
    let mut config = ChunkReaderConfig::default();
    if let Ok(value) = env::var("BLOBSTREAM_CHUNK_SIZE") {
        config = config.with_chunk_size(value.parse()?);
    }
    if let Ok(value) = env::var("BLOBSTREAM_PARALLELISM") {
        config = config.with_parallelism(value.parse()?);
    }
    Ok(config)
}
