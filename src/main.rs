use anyhow::Context;
use clap::{Parser, Subcommand};
use image_registration::analysis::BenchmarkRunner;
use image_registration::config::{Config, ConfigFormat};
use image_registration::data::{image_center, load_image, save_image, validate_image_size};
use image_registration::logging::{init_logging, LoggingConfig};
use image_registration::transform::TransformRecord;
use image_registration::{
    with_dyn_image, AffineTransform, BackendKind, DynImage, ImageRegistration, InterpolationMode, ParameterVector,
    Resampler, TransformClass,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "imreg")]
#[command(about = "Intensity-based 2-D image registration and affine resampling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the transform carrying the moving image onto the fixed image
    Register {
        /// Reference image
        #[arg(short, long)]
        fixed: PathBuf,

        /// Image to be aligned onto the reference
        #[arg(short, long)]
        moving: PathBuf,

        /// Transform model: translation or affine
        #[arg(long, default_value = "translation")]
        class: TransformClass,

        /// Registration backend: step-descent or elastix (overrides the configuration)
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// Write the estimated transform to this file (.toml or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the moving image resampled onto the fixed grid
        #[arg(long)]
        resampled: Option<PathBuf>,
    },

    /// Apply an affine transform to an image
    Resample {
        #[arg(short, long)]
        input: PathBuf,

        /// Six comma-separated values m00,m01,m10,m11,tx,ty
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true, required_unless_present = "record")]
        parameters: Vec<f64>,

        /// Transform file written by `register --output`
        #[arg(long, conflicts_with = "parameters")]
        record: Option<PathBuf>,

        /// Rotation origin x,y (defaults to the image center)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        origin: Option<Vec<f64>>,

        /// nearest or bspline (overrides the configuration)
        #[arg(long)]
        interpolation: Option<InterpolationMode>,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Measure translation recovery on synthetic image pairs
    Benchmark {
        /// Side length of the synthetic images
        #[arg(long)]
        size: Option<usize>,

        /// Known shift dx,dy; repeat for several cases
        #[arg(long = "shift", value_parser = parse_shift, allow_hyphen_values = true)]
        shifts: Vec<(f64, f64)>,

        /// Standard deviation of the Gaussian noise added to the fixed images
        #[arg(long)]
        noise: Option<f64>,

        /// Backends to compare (comma-separated)
        #[arg(short, long, value_delimiter = ',', default_value = "step-descent")]
        backends: Vec<BackendKind>,

        /// Output file for benchmark results
        #[arg(short, long, default_value = "results/benchmark.json")]
        output: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        #[arg(short, long, default_value = "imreg.toml")]
        output: PathBuf,
    },
}

fn parse_shift(value: &str) -> Result<(f64, f64), String> {
    let (dx, dy) = value
        .split_once(',')
        .ok_or_else(|| format!("expected dx,dy, got '{value}'"))?;
    let parse = |s: &str| s.trim().parse::<f64>().map_err(|e| format!("'{s}': {e}"));
    Ok((parse(dx)?, parse(dy)?))
}

/// Logging is not up yet, so a bad file is an error rather than a logged fallback
fn load_config(path: &str) -> anyhow::Result<Config> {
    let config = Config::load_from_file(path)?;
    if let Err(errors) = config.validate() {
        anyhow::bail!("invalid configuration '{}': {}", path, errors.join("; "));
    }
    Ok(config)
}

fn apply_verbosity(logging: &mut LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => return,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    for field in [
        &mut logging.global_level,
        &mut logging.registration_level,
        &mut logging.resample_level,
        &mut logging.backend_level,
        &mut logging.bindings_level,
    ] {
        *field = level.to_string();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    apply_verbosity(&mut config.logging, cli.verbose);
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Register {
            fixed,
            moving,
            class,
            backend,
            output,
            resampled,
        } => {
            handle_register(&config, fixed, moving, class, backend, output, resampled)?;
        }
        Commands::Resample {
            input,
            parameters,
            record,
            origin,
            interpolation,
            output,
        } => {
            handle_resample(&config, input, parameters, record, origin, interpolation, output)?;
        }
        Commands::Benchmark {
            size,
            shifts,
            noise,
            backends,
            output,
        } => {
            handle_benchmark(&config, size, shifts, noise, backends, output)?;
        }
        Commands::InitConfig { output } => {
            handle_init_config(&config, output)?;
        }
    }

    Ok(())
}

fn handle_register(
    config: &Config,
    fixed_path: PathBuf,
    moving_path: PathBuf,
    class: TransformClass,
    backend: Option<BackendKind>,
    output: Option<PathBuf>,
    resampled: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("Loading images...");
    let fixed = load_image(&fixed_path)?;
    let moving = load_image(&moving_path)?;

    println!(
        "Fixed: {}x{} {}, Moving: {}x{} {}",
        fixed.width(),
        fixed.height(),
        fixed.element_type(),
        moving.width(),
        moving.height(),
        moving.element_type()
    );
    validate_image_size(&fixed, 8)?;
    validate_image_size(&moving, 8)?;

    let mut registration = config.registration.clone();
    if let Some(backend) = backend {
        registration.backend = backend;
    }
    let engine = ImageRegistration::from_config(&registration)?;

    println!("Running {} registration with {}...", class, engine.backend_name());
    let result = engine
        .register_dyn(&fixed, &moving, class)
        .context("registration failed")?;

    let [m00, m01, m10, m11, tx, ty] = result.parameters.0;
    println!("\n=== Registration Result ===");
    println!("Linear:      [{m00:.6} {m01:.6}; {m10:.6} {m11:.6}]");
    println!("Translation: ({tx:.4}, {ty:.4}) px");
    println!("Origin:      ({:.1}, {:.1})", result.origin[0], result.origin[1]);
    if let Some(report) = &result.report {
        println!("Optimizer:   {:?} after {} iterations", report.state, report.iterations);
        println!("MI:          {:.4}", report.final_value);
    }

    let transform = result.transform();
    if let Some(path) = output {
        TransformRecord::new(&transform, (fixed.width(), fixed.height())).save(&path)?;
        println!("Transform saved to {}", path.display());
    }

    if let Some(path) = resampled {
        let resampler = Resampler::from_config(&config.resample);
        let mode = config.resample.interpolation;
        let aligned = with_dyn_image!(&moving, image => DynImage::from(resampler.resample(image, &transform, mode)?));
        save_image(&aligned, &path)?;
        println!("Resampled moving image saved to {}", path.display());
    }

    Ok(())
}

fn handle_resample(
    config: &Config,
    input: PathBuf,
    parameters: Vec<f64>,
    record: Option<PathBuf>,
    origin: Option<Vec<f64>>,
    interpolation: Option<InterpolationMode>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let image = load_image(&input)?;
    let shape = (image.width(), image.height());

    let mut transform = match record {
        Some(path) => {
            let record = TransformRecord::load(&path)?;
            record.transform().adapt(record.shape, shape)
        }
        None => {
            let parameters = ParameterVector::from_slice(&parameters).context("--parameters needs six values")?;
            AffineTransform::from_parameters(&parameters, image_center(shape.0, shape.1))
        }
    };
    if let Some(origin) = origin {
        let &[ox, oy] = origin.as_slice() else {
            anyhow::bail!("--origin needs two values x,y, got {}", origin.len());
        };
        transform.origin = [ox, oy];
    }

    let mode = interpolation.unwrap_or(config.resample.interpolation);
    let resampler = Resampler::from_config(&config.resample);
    let resampled = with_dyn_image!(&image, image => DynImage::from(resampler.resample(image, &transform, mode)?));

    save_image(&resampled, &output)?;
    println!("Resampled {}x{} {} image saved to {}", shape.0, shape.1, image.element_type(), output.display());
    Ok(())
}

fn handle_benchmark(
    config: &Config,
    size: Option<usize>,
    shifts: Vec<(f64, f64)>,
    noise: Option<f64>,
    backends: Vec<BackendKind>,
    output: PathBuf,
) -> anyhow::Result<()> {
    let mut benchmark = config.benchmark.clone();
    if let Some(size) = size {
        benchmark.image_size = size;
    }
    if !shifts.is_empty() {
        benchmark.shifts = shifts;
    }
    if let Some(noise) = noise {
        benchmark.noise_sigma = noise;
    }

    let mut runner = BenchmarkRunner::new(benchmark);
    for kind in backends {
        runner.add_backend(kind.create(&config.registration)?);
    }

    let report = runner.run_benchmark()?;

    println!("\n=== Benchmark ({}x{}, noise {}) ===", report.image_size, report.image_size, report.noise_sigma);
    println!("{:<14} {:>10} {:>14}", "Backend", "Success", "Mean error");
    for summary in &report.backends {
        let mean = summary
            .mean_error_px
            .map(|e| format!("{e:.3} px"))
            .unwrap_or_else(|| "-".to_string());
        println!("{:<14} {:>9.0}% {:>14}", summary.backend, summary.success_rate * 100.0, mean);
    }

    report.save(&output)?;
    println!("Results saved to {}", output.display());
    Ok(())
}

fn handle_init_config(config: &Config, output: PathBuf) -> anyhow::Result<()> {
    let format = match output.extension().and_then(|e| e.to_str()) {
        Some("json") => ConfigFormat::Json,
        _ => ConfigFormat::Toml,
    };
    config.save_to_file(&output, format)?;
    println!("Configuration written to {}", output.display());
    Ok(())
}
