use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use seekzstd::cli::{archive_name, parse_byte_size, path_has_suffix, strip_suffix, zstd_level};
use seekzstd::{
    parse_integrity_size, parse_seek_table, Decoder, DecoderOptions, Encoder, EncoderOptions,
    FrameSizePolicy, SeekTable, SEEK_TABLE_INTEGRITY_SIZE,
};

const DEFAULT_SUFFIX: &str = ".zst";
const DEFAULT_FRAME_SIZE: &str = "512K";

#[derive(Parser)]
#[command(name = "seekzstd", version, about = "Seekable zstd compression utility")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Files to process; `-` or nothing reads stdin
    files: Vec<PathBuf>,
    /// Suppress per-file warnings
    #[arg(short, long)]
    quiet: bool,
    /// Report per-file statistics
    #[arg(short, long)]
    verbose: bool,
    /// Archive suffix
    #[arg(short = 'S', long, default_value = DEFAULT_SUFFIX)]
    suffix: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress files into seekable archives
    Compress {
        #[command(flatten)]
        common: CommonArgs,
        /// Compression level (1=fastest, 9=best)
        #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(1..=9))]
        level: u8,
        /// Frame size threshold, e.g. 512K or 4M
        #[arg(long, default_value = DEFAULT_FRAME_SIZE)]
        frame_size: String,
        /// Bound frames by decompressed size instead of compressed size
        #[arg(long)]
        uncompressed_frames: bool,
        /// Skip the per-frame content checksum
        #[arg(long)]
        no_checksum: bool,
        /// Write to standard output
        #[arg(short = 'c', long)]
        stdout: bool,
        /// Overwrite existing output files
        #[arg(short, long)]
        force: bool,
        /// Remove source files after successful compression
        #[arg(long)]
        no_keep: bool,
        /// Recurse into directories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Decompress seekable archives
    Decompress {
        #[command(flatten)]
        common: CommonArgs,
        /// Output file (single input only)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write to standard output
        #[arg(short = 'c', long)]
        stdout: bool,
        /// Overwrite existing output files
        #[arg(short, long)]
        force: bool,
        /// Remove archives after successful decompression
        #[arg(long)]
        no_keep: bool,
        /// First frame to decompress
        #[arg(long, default_value_t = 0)]
        start_frame: u32,
        /// Last frame to decompress; 0 means the last frame
        #[arg(long, default_value_t = 0)]
        end_frame: u32,
        /// Recurse into directories
        #[arg(short, long)]
        recursive: bool,
    },
    /// List archive contents
    List {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Check archive integrity by decoding to a sink
    Test {
        #[command(flatten)]
        common: CommonArgs,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    std::process::exit(run(cli.command));
}

/// Process every file, reporting per-file failures without aborting the
/// batch. Returns the process exit code.
fn run(command: Commands) -> i32 {
    let common = match &command {
        Commands::Compress { common, .. }
        | Commands::Decompress { common, .. }
        | Commands::List { common }
        | Commands::Test { common } => common,
    };
    let files = if common.files.is_empty() {
        vec![PathBuf::from("-")]
    } else {
        common.files.clone()
    };
    let quiet = common.quiet;

    let mut exit_code = 0;
    for file in files {
        if let Err(err) = process_file(&file, &command) {
            if !quiet {
                eprintln!("seekzstd: {}: {err:#}", file.display());
            }
            exit_code = 1;
        }
    }
    exit_code
}

fn process_file(file: &Path, command: &Commands) -> Result<()> {
    debug!("processing {}", file.display());
    match command {
        Commands::Compress {
            common,
            level,
            frame_size,
            uncompressed_frames,
            no_checksum,
            stdout,
            force,
            no_keep,
            recursive,
        } => {
            if *recursive && file != Path::new("-") && file.is_dir() {
                return walk_dir(file, &|path| {
                    // Skip anything that already carries the archive suffix.
                    if path_has_suffix(path, &common.suffix) {
                        return Ok(());
                    }
                    process_file(path, command)
                });
            }
            let threshold = parse_byte_size(frame_size).context("invalid frame size")?;
            let size = u32::try_from(threshold).context("frame size exceeds 4 GiB")?;
            let options = EncoderOptions {
                level: zstd_level(*level),
                frame_policy: if *uncompressed_frames {
                    FrameSizePolicy::Uncompressed { size }
                } else {
                    FrameSizePolicy::Compressed { size }
                },
                checksum_flag: !no_checksum,
                ..EncoderOptions::default()
            };
            cmd_compress(file, common, options, *stdout, *force, *no_keep)
        }
        Commands::Decompress {
            common,
            output,
            stdout,
            force,
            no_keep,
            start_frame,
            end_frame,
            recursive,
        } => {
            if *recursive && file != Path::new("-") && file.is_dir() {
                return walk_dir(file, &|path| {
                    if !path_has_suffix(path, &common.suffix) {
                        return Ok(());
                    }
                    process_file(path, command)
                });
            }
            let options = DecoderOptions {
                lower_frame: *start_frame,
                upper_frame: *end_frame,
                ..DecoderOptions::default()
            };
            cmd_decompress(
                file,
                common,
                options,
                output.as_deref(),
                *stdout,
                *force,
                *no_keep,
            )
        }
        Commands::List { common } => cmd_list(file, common),
        Commands::Test { common } => cmd_test(file, common),
    }
}

fn cmd_compress(
    file: &Path,
    common: &CommonArgs,
    options: EncoderOptions,
    stdout: bool,
    force: bool,
    no_keep: bool,
) -> Result<()> {
    if file == Path::new("-") || stdout {
        let mut input: Box<dyn Read> = if file == Path::new("-") {
            Box::new(io::stdin().lock())
        } else {
            Box::new(File::open(file).with_context(|| format!("open {}", file.display()))?)
        };
        let out = io::stdout().lock();
        compress_stream(&mut input, out, options)?;
        return Ok(());
    }

    if file.is_dir() {
        bail!("is a directory (use --recursive)");
    }
    let output_path = archive_name(file, &common.suffix);
    if output_path.exists() && !force {
        bail!("{} already exists (use --force)", output_path.display());
    }

    let mut input = File::open(file).with_context(|| format!("open {}", file.display()))?;
    let output =
        File::create(&output_path).with_context(|| format!("create {}", output_path.display()))?;
    let (read, written) = match compress_stream(&mut input, output, options) {
        Ok(sizes) => sizes,
        Err(err) => {
            let _ = fs::remove_file(&output_path);
            return Err(err);
        }
    };

    if common.verbose {
        let ratio = if written > 0 {
            read as f64 / written as f64 * 100.0
        } else {
            0.0
        };
        let action = if no_keep { "replaced with" } else { "compressed to" };
        println!(
            "{}:\t{ratio:.1}% -- {action} {}",
            file.display(),
            output_path.display()
        );
    }
    if no_keep {
        fs::remove_file(file).with_context(|| format!("remove {}", file.display()))?;
    }
    Ok(())
}

/// Returns (decompressed bytes read, compressed bytes written).
fn compress_stream<R: Read, W: Write>(
    input: &mut R,
    output: W,
    options: EncoderOptions,
) -> Result<(u64, u64)> {
    let mut encoder = Encoder::new(output, options)?;
    let read = io::copy(input, &mut encoder).context("compress")?;
    encoder.finish().context("write seek table")?;
    Ok((read, encoder.written_compressed()))
}

fn cmd_decompress(
    file: &Path,
    common: &CommonArgs,
    options: DecoderOptions,
    output: Option<&Path>,
    stdout: bool,
    force: bool,
    no_keep: bool,
) -> Result<()> {
    if file == Path::new("-") {
        // Stdin is not seekable; buffer the whole archive first.
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        let mut decoder = Decoder::new(Cursor::new(data), options)?;
        io::copy(&mut decoder, &mut io::stdout().lock()).context("decompress")?;
        return Ok(());
    }

    if file.is_dir() {
        bail!("is a directory (use --recursive)");
    }
    if output.is_none() && !stdout && !path_has_suffix(file, &common.suffix) {
        bail!("unknown suffix -- ignored");
    }
    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(strip_suffix(file, &common.suffix)),
    };
    if output_path == file {
        bail!("would overwrite input file");
    }

    let input = File::open(file).with_context(|| format!("open {}", file.display()))?;
    let mut decoder = Decoder::new(input, options)?;

    if stdout {
        io::copy(&mut decoder, &mut io::stdout().lock()).context("decompress")?;
        return Ok(());
    }
    if output_path.exists() && !force {
        bail!("{} already exists (use --force)", output_path.display());
    }
    let mut out =
        File::create(&output_path).with_context(|| format!("create {}", output_path.display()))?;
    if let Err(err) = io::copy(&mut decoder, &mut out).context("decompress") {
        let _ = fs::remove_file(&output_path);
        return Err(err);
    }

    if common.verbose {
        println!("{}:\t{}", file.display(), output_path.display());
    }
    if no_keep {
        fs::remove_file(file).with_context(|| format!("remove {}", file.display()))?;
    }
    Ok(())
}

fn cmd_list(file: &Path, common: &CommonArgs) -> Result<()> {
    if file == Path::new("-") {
        bail!("cannot list from stdin");
    }
    let mut input = File::open(file).with_context(|| format!("open {}", file.display()))?;
    let archive_size = input.metadata()?.len();
    let table = read_seek_table(&mut input)?;

    let num_frames = table.num_frames();
    let decompressed = if num_frames > 0 {
        table.frame_end_decomp(num_frames - 1)?
    } else {
        0
    };
    let ratio = if decompressed > 0 {
        archive_size as f64 / decompressed as f64 * 100.0
    } else {
        0.0
    };

    println!(
        "{archive_size:>12} {decompressed:>12} {ratio:>5.1}% {}",
        strip_suffix(file, &common.suffix)
    );
    if common.verbose {
        println!("frames: {num_frames}");
        for i in 0..num_frames.min(10) {
            println!(
                "  frame {i}: {} -> {} bytes",
                table.frame_size_comp(i)?,
                table.frame_size_decomp(i)?
            );
        }
        if num_frames > 10 {
            println!("  ... and {} more frames", num_frames - 10);
        }
    }
    Ok(())
}

fn cmd_test(file: &Path, common: &CommonArgs) -> Result<()> {
    if file == Path::new("-") {
        let mut data = Vec::new();
        io::stdin().lock().read_to_end(&mut data)?;
        let mut decoder = Decoder::new(Cursor::new(data), DecoderOptions::default())?;
        io::copy(&mut decoder, &mut io::sink()).context("decode")?;
    } else {
        let input = File::open(file).with_context(|| format!("open {}", file.display()))?;
        let mut decoder = Decoder::new(input, DecoderOptions::default())?;
        io::copy(&mut decoder, &mut io::sink()).context("decode")?;
    }
    if common.verbose {
        println!("{}:\tOK", file.display());
    }
    Ok(())
}

fn walk_dir(dir: &Path, visit: &dyn Fn(&Path) -> Result<()>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            walk_dir(&path, visit)?;
        } else {
            visit(&path)?;
        }
    }
    Ok(())
}

/// Load the seek table from the tail of an archive file.
fn read_seek_table(input: &mut File) -> Result<SeekTable> {
    let mut integrity = [0u8; SEEK_TABLE_INTEGRITY_SIZE];
    input.seek(SeekFrom::End(-(SEEK_TABLE_INTEGRITY_SIZE as i64)))?;
    input.read_exact(&mut integrity)?;
    let table_size = parse_integrity_size(&integrity)?;

    input.seek(SeekFrom::End(-(table_size as i64)))?;
    let mut data = vec![0u8; table_size as usize];
    input.read_exact(&mut data)?;
    Ok(parse_seek_table(&data)?)
}

