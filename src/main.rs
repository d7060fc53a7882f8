use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use exif_rename_core::{
    ConfigError, ExifExtractor, Journal, NoMetadataPolicy, RunOptions, TransferMode, Verbosity,
};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Parser)]
#[command(
    name = "exif-rename",
    version,
    about = "Rename or copy JPEG files after their EXIF capture date: YYYY-MM-DD_HH-MM-SS[_NN].jpg"
)]
struct Cli {
    /// Image files or directories to process
    inputs: Vec<PathBuf>,

    /// Directory where the jpg/JPG files are searched for (may be repeated)
    #[arg(short = 'd', long = "input-directory")]
    input_directories: Vec<PathBuf>,

    /// Directory where the renamed files are written (default: rename in place)
    #[arg(short, long)]
    output_directory: Option<PathBuf>,

    /// Look for files in subdirectories too
    #[arg(short, long)]
    recursive: bool,

    /// Reproduce the input subdirectories in the output directory
    #[arg(short = 'C', long)]
    copy_directory_tree: bool,

    /// Move the files instead of copying them
    #[arg(short, long = "move")]
    move_files: bool,

    /// Do not overwrite an existing file
    #[arg(short, long)]
    no_clobber: bool,

    /// Only report what would be done
    #[arg(short = 't', long, visible_alias = "test")]
    dry_run: bool,

    /// Also process files without EXIF capture date, keeping their name
    #[arg(short = 'N', long)]
    include_file_with_no_exif: bool,

    /// Leave the seconds out of the file name
    #[arg(long)]
    no_seconds: bool,

    /// File extension to process, case-sensitive (may be repeated; default: jpg, JPG)
    #[arg(short, long = "extension")]
    extensions: Vec<String>,

    /// Write all logging information to this file
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Write the resolved rename plan as JSON to this file
    #[arg(long)]
    save_plan: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// No output on the terminal
    #[arg(short, long)]
    silent: bool,
}

impl Cli {
    fn into_options(self) -> RunOptions {
        let mut inputs = self.inputs;
        inputs.extend(self.input_directories);

        let mut options = RunOptions::new(inputs);
        options.output_directory = self.output_directory;
        options.recursive = self.recursive;
        options.mirror_tree = self.copy_directory_tree;
        options.mode = if self.dry_run {
            TransferMode::DryRun
        } else if self.move_files {
            TransferMode::Move
        } else {
            TransferMode::Copy
        };
        options.no_clobber = self.no_clobber;
        options.no_metadata = if self.include_file_with_no_exif {
            NoMetadataPolicy::Include
        } else {
            NoMetadataPolicy::Exclude
        };
        options.seconds_in_filename = !self.no_seconds;
        if !self.extensions.is_empty() {
            options.extensions = self
                .extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect();
        }
        options.log_file = self.log;
        options.plan_file = self.save_plan;
        options
    }
}

fn setup_logging(verbosity: Verbosity) {
    env_logger::Builder::new()
        .filter_level(verbosity.level_filter())
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let verbosity = match Verbosity::from_flags(cli.verbose, cli.silent) {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::from(err.exit_code());
        }
    };
    setup_logging(verbosity);

    let options = cli.into_options();
    let journal = Journal::new(verbosity);
    let t_total = std::time::Instant::now();

    let bar = if verbosity == Verbosity::Normal {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {msg}")
            .unwrap(),
    );
    bar.set_message("Reading EXIF");

    // Only metadata reading is drawn; transfers print one line per file
    let outcome = exif_rename_core::run(&options, &ExifExtractor, &journal, &move |stage, current, total, _message| {
        if stage != "extract" {
            return;
        }
        bar.set_length(total);
        bar.inc(1);
        if current + 1 >= total {
            bar.finish_and_clear();
        }
    });

    let log_path_rejected = matches!(
        outcome.as_ref().err().and_then(|e| e.downcast_ref::<ConfigError>()),
        Some(ConfigError::NotWritable(_))
    );
    if let Some(path) = options.log_file.as_ref().filter(|_| !log_path_rejected) {
        if let Err(err) = journal.write_to(path) {
            eprintln!("Error: cannot write log file '{}': {:#}", path.display(), err);
        }
    }

    match outcome {
        Ok(result) => {
            if verbosity != Verbosity::Silent {
                eprintln!(
                    "Done! {} images found, {} with capture date, {} transferred, {} would transfer, {} skipped, {} failed ({:.2}s)",
                    result.discovered,
                    result.with_metadata,
                    result.transferred,
                    result.would_transfer,
                    result.skipped,
                    result.failed,
                    t_total.elapsed().as_secs_f64()
                );
            }
            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                eprintln!("{} file(s) could not be transferred:", result.failed);
                for failure in &result.failures {
                    eprintln!("  {}", failure);
                }
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<ConfigError>() {
                Some(config) => ExitCode::from(config.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}
