//! Strata CLI
//!
//! Writes synthetic segmented files and reads them back through any variant.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use strata::compress::Lz4Compressor;
use strata::segmented::{self, SegmentedFileWriter};
use strata::{Config, DiskAccessMode, Result, SegmentedFile, StrataError};
use tracing_subscriber::{fmt, EnvFilter};

/// Strata
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Segmented access to immutable table files")]
#[command(version)]
struct Args {
    /// Disk access mode (auto, mmap, mmap_index_only, standard)
    #[arg(short, long, default_value = "auto")]
    mode: DiskAccessMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a synthetic data file and its bounds marker
    Write {
        path: PathBuf,

        /// Number of records
        #[arg(short, long, default_value = "1024")]
        records: u64,

        /// Bytes per record
        #[arg(short = 's', long, default_value = "4096")]
        record_size: usize,

        /// Compress the file in chunks
        #[arg(short, long)]
        compress: bool,

        /// Uncompressed chunk size in KiB
        #[arg(long, default_value = "64")]
        chunk_kb: usize,
    },

    /// Iterate every segment of a file and report totals
    Scan {
        path: PathBuf,

        /// The file was written with --compress
        #[arg(short, long)]
        compressed: bool,

        /// Mapping cap in MiB
        #[arg(long)]
        max_segment_mb: Option<u64>,

        /// Record size used at write time; re-offers record edges as boundaries
        #[arg(short = 's', long)]
        record_size: Option<u64>,

        /// Concurrent scanners
        #[arg(short, long, default_value = "1")]
        threads: usize,
    },

    /// Print bytes at a position in hex
    Read {
        path: PathBuf,

        #[arg(short, long)]
        compressed: bool,

        #[arg(short, long, default_value = "0")]
        position: u64,

        #[arg(short, long, default_value = "64")]
        len: usize,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,strata=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    tracing::info!("Strata v{}", strata::VERSION);

    let config = Config::builder().disk_access_mode(args.mode).build();

    let result = match args.command {
        Commands::Write {
            path,
            records,
            record_size,
            compress,
            chunk_kb,
        } => {
            let config = Config {
                chunk_length: chunk_kb * 1024,
                ..config
            };
            write(&config, &path, records, record_size, compress)
        }
        Commands::Scan {
            path,
            compressed,
            max_segment_mb,
            record_size,
            threads,
        } => {
            let config = match max_segment_mb {
                Some(mb) => Config {
                    max_segment_size: mb * 1024 * 1024,
                    ..config
                },
                None => config,
            };
            scan(&config, &path, compressed, record_size, threads.max(1))
        }
        Commands::Read {
            path,
            compressed,
            position,
            len,
        } => read(&config, &path, compressed, position, len),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Path of the bounds marker stored next to a data file
fn bounds_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bounds");
    PathBuf::from(name)
}

fn new_builder(
    config: &Config,
    compressed: bool,
) -> Box<dyn segmented::SegmentedFileBuilder> {
    let mode = config.data_access_mode();
    if compressed {
        segmented::compressed_builder(config, mode)
    } else {
        segmented::builder(config, mode)
    }
}

fn write(
    config: &Config,
    path: &Path,
    records: u64,
    record_size: usize,
    compress: bool,
) -> Result<()> {
    config.validate()?;
    let builder = new_builder(config, compress);
    let mut writer = if compress {
        SegmentedFileWriter::create_compressed(
            path,
            builder,
            config.chunk_length,
            std::sync::Arc::new(Lz4Compressor),
        )?
    } else {
        SegmentedFileWriter::create(path, builder)?
    };

    let mut record = vec![0u8; record_size];
    for i in 0..records {
        // Low-entropy payload so compression has something to do
        for (j, byte) in record.iter_mut().enumerate() {
            *byte = ((i as usize + j / 64) % 251) as u8;
        }
        writer.append_record(&record)?;
    }

    let mut marker = BufWriter::new(File::create(bounds_path(path))?);
    writer.serialize_bounds(&mut marker)?;
    marker.flush()?;

    let mut file = writer.finish()?;
    println!(
        "{}: {} records, length {} bytes, on disk {} bytes",
        file.kind(),
        records,
        file.length(),
        file.on_disk_length()
    );
    file.cleanup();
    Ok(())
}

/// Reload the bounds marker and bind a builder to the finished file
fn open(
    config: &Config,
    path: &Path,
    compressed: bool,
    record_size: Option<u64>,
) -> Result<Box<dyn SegmentedFile>> {
    let mut builder = new_builder(config, compressed);
    let marker = bounds_path(path);
    if marker.exists() {
        let mut input = BufReader::new(File::open(&marker)?);
        builder.deserialize_bounds(&mut input)?;
    } else {
        tracing::warn!(path = %marker.display(), "No bounds marker; skipping mode check");
    }

    if let Some(size) = record_size.filter(|&s| s > 0) {
        let length = std::fs::metadata(path)?.len();
        let mut boundary = 0;
        while boundary < length {
            builder.add_potential_boundary(boundary);
            boundary += size;
        }
    }
    builder.complete(path)
}

/// Per-thread scan totals
#[derive(Debug, Default, Clone, Copy)]
struct ScanStats {
    segments: u64,
    bytes: u64,
    crc: u32,
}

fn scan_once(file: &dyn SegmentedFile) -> Result<ScanStats> {
    let mut stats = ScanStats::default();
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    for segment in file.iter(0) {
        let mut segment = segment?;
        loop {
            let n = segment
                .read(&mut buf)
                .map_err(|e| StrataError::read(segment.path(), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            stats.bytes += n as u64;
        }
        segment.close();
        stats.segments += 1;
    }

    stats.crc = hasher.finalize();
    Ok(stats)
}

fn scan(
    config: &Config,
    path: &Path,
    compressed: bool,
    record_size: Option<u64>,
    threads: usize,
) -> Result<()> {
    let mut file = open(config, path, compressed, record_size)?;
    tracing::info!("Scanning {:?} on {} thread(s)", file, threads);

    let shared: &dyn SegmentedFile = file.as_ref();
    let results: Vec<Result<ScanStats>> = crossbeam::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| s.spawn(move |_| scan_once(shared)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("scanner thread panicked"))
            .collect()
    })
    .expect("scanner scope panicked");

    for (thread, result) in results.into_iter().enumerate() {
        let stats = result?;
        println!(
            "thread {}: {} segments, {} bytes, crc32 {:08x}",
            thread, stats.segments, stats.bytes, stats.crc
        );
    }

    file.cleanup();
    Ok(())
}

fn read(config: &Config, path: &Path, compressed: bool, position: u64, len: usize) -> Result<()> {
    let mut file = open(config, path, compressed, None)?;

    let mut out = Vec::with_capacity(len);
    let mut next = position;
    while out.len() < len && next < file.length() {
        let mut segment = file.get_segment(next)?;
        let want = (len - out.len()).min(segment.bytes_remaining() as usize);
        out.extend_from_slice(&segment.read_bytes(want)?);
        next = segment.file_pointer();
        segment.close();
    }

    for (i, line) in out.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:>12}  {}", position + (i * 16) as u64, hex.join(" "));
    }

    file.cleanup();
    Ok(())
}
