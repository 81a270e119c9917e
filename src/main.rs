use cbz_recode::archive::ZipBackend;
use cbz_recode::formats::FormatFilter;
use cbz_recode::pipeline::{self, Paths};
use cbz_recode::{config, output, scan};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "cbz-recode")]
#[command(about = "Re-encode the images inside comic archives as size-budgeted JPEG")]
#[command(long_about = "\
Re-encode the images inside comic archives as size-budgeted JPEG

Every .cbz/.zip under the source directory with enough WebP, PNG, BMP or TIFF
pages is rebuilt under the output directory, at the same relative path, as a
flat archive of JPEGs. Other entries are copied through untouched.

  library/                          converted/
  └── Series/                       └── Series/
      ├── vol1.cbz                      ├── vol1.cbz     # pages now .jpg
      │   ├── ch1/001.webp              │   ├── 001.jpg
      │   ├── ch1/002.webp              │   ├── 002.jpg
      │   └── ComicInfo.xml             │   └── ComicInfo.xml
      └── notes.txt                     (not an archive: left alone)

Pages are encoded at [jpeg] quality. While the converted pages are larger than
[fallback] ratio × the original pages, the whole archive is encoded again
[fallback] step lower, down to [fallback] floor.

Archives are converted one at a time in --temp-dir, which is removed at the
end of the run.

Run 'cbz-recode gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory searched recursively for archives
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Directory the converted archives are written to (must exist)
    #[arg(long, default_value = "converted", global = true)]
    output: PathBuf,

    /// Scratch directory for extracted and converted files
    #[arg(long, default_value = ".cbz-recode-temp", global = true)]
    temp_dir: PathBuf,

    /// Config file (stock defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the archives that would be converted
    Scan,
    /// Convert every selected archive
    Convert {
        /// Also write the run summary as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Scan => {
            let config = config::load_config(cli.config.as_deref())?;
            let filter = FormatFilter::new(&config.formats);
            let backend = ZipBackend::new(config.archive.compression);
            let report = scan::scan(&cli.source, &filter, config.scan.threshold, &backend)?;
            output::print_scan(&report, &cli.source);
        }
        Command::Convert { report } => {
            let config = config::load_config(cli.config.as_deref())?;
            let paths = Paths {
                source: cli.source,
                destination: cli.output,
                scratch: cli.temp_dir,
            };

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = pipeline::run(&paths, &config, Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            let summary = result?;

            println!();
            output::print_summary(&summary);
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&path, json)?;
                println!("Report: {}", path.display());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}
