use clap::{Parser, Subcommand};
use hfsimage::{ConvertOptions, ConvertTarget, CopyControl};
use std::io::{Write, stderr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Inspect and convert classic Macintosh HFS disk images.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe a disk image.
    Info {
        /// Also show device, boot block and signature details.
        #[arg(short, long)]
        verbose: bool,
        file: PathBuf,
    },
    /// Extract the HFS volume into a bare volume image (<file>.dsk by default).
    Cvt2hfs {
        /// Leave the volume unlocked.
        #[arg(short, long)]
        writable: bool,
        file: PathBuf,
        dst: Option<PathBuf>,
    },
    /// Wrap the HFS volume in a bootable partitioned image (<file>.iso by default).
    Cvt2iso {
        /// Leave the volume unlocked.
        #[arg(short, long)]
        writable: bool,
        file: PathBuf,
        dst: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let env = env_logger::Env::default().default_filter_or("warn");
    env_logger::Builder::from_env(env).init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli.command) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn dispatch(command: Command) -> hfsimage::Result<()> {
    match command {
        Command::Info { verbose, file } => {
            print!("{}", hfsimage::probe_and_describe(&file, verbose)?);
            Ok(())
        }
        Command::Cvt2hfs { writable, file, dst } => {
            let options = ConvertOptions {
                target: ConvertTarget::Volume,
                writable,
            };
            let dst = dst.unwrap_or_else(|| with_suffix(&file, ".dsk"));
            convert(&options, &file, &dst)
        }
        Command::Cvt2iso { writable, file, dst } => {
            let options = ConvertOptions {
                target: ConvertTarget::PartitionedImage,
                writable,
            };
            let dst = dst.unwrap_or_else(|| with_suffix(&file, ".iso"));
            convert(&options, &file, &dst)
        }
    }
}

fn convert(options: &ConvertOptions, file: &Path, dst: &Path) -> hfsimage::Result<()> {
    println!("Converting {} to {}", file.display(), dst.display());

    let mut progress = |fraction: f64| draw_progress(fraction);
    let mut control = CopyControl::with_progress(&mut progress);
    let result = hfsimage::convert(options, file, dst, &mut control);
    eprintln!();
    result?;

    println!("Done.");
    Ok(())
}

/// `file` with `suffix` appended to its full name, e.g. `disk.img.dsk`.
fn with_suffix(file: &Path, suffix: &str) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn draw_progress(fraction: f64) {
    const WIDTH: usize = 40;
    let filled = ((fraction.clamp(0.0, 1.0) * WIDTH as f64) as usize).min(WIDTH);
    let mut err = stderr().lock();
    let _ = write!(
        err,
        "\r[{}{}] {:3.0}%",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        fraction * 100.0
    );
    let _ = err.flush();
}
