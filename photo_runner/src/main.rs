use clap::Parser;
use std::path::{Path, PathBuf};

use photo_runner::convert::Image;
use photo_runner::error::AppError;
use photo_runner::job::Job;
use photo_runner::loader::{PhotoLibrary, lib_filename};
use photo_runner::session::Session;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(name = "photo_runner")]
struct Args {
    /// path to an input image; repeat for sequence operations
    #[arg(long, required = true)]
    input: Vec<String>,

    /// path to output image
    #[arg(long)]
    output: String,

    /// path to TOML job file
    #[arg(long)]
    params: String,

    /// directory with the photo_async library (default target/debug)
    #[arg(long, default_value = "target/debug")]
    library_path: String,
}

fn main() -> Result<(), AppError> {
    init_tracing();

    let args = Args::parse();

    for input in &args.input {
        if !Path::new(input).exists() {
            return Err(AppError::MissingInput(input.clone()));
        }
    }
    if !Path::new(&args.params).exists() {
        return Err(AppError::MissingParams(args.params));
    }

    let job = Job::parse(&std::fs::read_to_string(&args.params)?)?;
    for extra in job.extra_inputs() {
        if !extra.exists() {
            return Err(AppError::MissingInput(extra.display().to_string()));
        }
    }

    let inputs = args
        .input
        .iter()
        .map(|p| Image::load_bgr(Path::new(p)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut library_path = PathBuf::from(&args.library_path);
    library_path.push(lib_filename("photo_async"));

    if !library_path.exists() {
        return Err(AppError::MissingLibrary(library_path.display().to_string()));
    }

    tracing::info!(
        operation = job.name(),
        inputs = inputs.len(),
        library = library_path.display().to_string(),
        "processing.."
    );

    // SAFETY:
    // - We only load from a path we constructed and checked exists.
    // - `PhotoLibrary::load` is unsafe because Rust can't verify at compile time that the loaded
    //   dynamic library exports the expected symbols with the expected ABI/signatures.
    // - If the library is not compatible, calling through the resolved pointers would be
    //   Undefined Behavior.
    let library = unsafe { PhotoLibrary::load(&library_path)? };
    let outputs = Session::new(library.api()).run(&job, &inputs)?;

    let output = Path::new(&args.output);
    for (path, image) in output_paths(output, &job, outputs.len()).iter().zip(&outputs) {
        image.save(path)?;
        tracing::info!(output_file = %path.display(), rows = image.rows, cols = image.cols, "output file saved");
    }

    Ok(())
}

/// Pencil sketch writes the colour rendering next to the sketch; aligned
/// sequences get an index suffix per image.
fn output_paths(output: &Path, job: &Job, count: usize) -> Vec<PathBuf> {
    let stem = output.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let ext = output.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "png".into());
    let sibling = |suffix: &str| output.with_file_name(format!("{stem}_{suffix}.{ext}"));

    match job {
        Job::PencilSketch { .. } => vec![output.to_path_buf(), sibling("color")],
        Job::AlignMtb { .. } => (0..count).map(|i| sibling(&i.to_string())).collect(),
        _ => vec![output.to_path_buf()],
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
