use clap::Parser;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use turbprop_core::{Complex64, Simulation, SimulationConfig};

/// Split-step propagation of a plane wave through turbulence
#[derive(Parser, Debug)]
#[command(name = "turbprop-demo")]
#[command(about = "Headless atmospheric turbulence propagation demo", long_about = None)]
struct Args {
    /// JSON file with a full or partial simulation configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the screen generator
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Propagate without turbulence
    #[arg(long)]
    vacuum: bool,

    /// Re-target turbulence strength to this Rytov number (overrides Cn²)
    #[arg(long)]
    rytov: Option<f64>,

    /// Disable subharmonic compensation
    #[arg(long)]
    no_subharmonics: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Per-field overrides applied on top of the defaults or the JSON file
#[derive(clap::Args, Debug)]
struct ConfigOverrides {
    /// Samples per side N
    #[arg(short = 'n', long)]
    grid_size: Option<usize>,

    /// Source-plane pitch dx (m)
    #[arg(long)]
    source_pitch: Option<f64>,

    /// Receiver-plane pitch Rdx (m)
    #[arg(long)]
    receiver_pitch: Option<f64>,

    /// Wavelength (m)
    #[arg(short, long)]
    wavelength: Option<f64>,

    /// Path length (m)
    #[arg(short = 'L', long)]
    path_length: Option<f64>,

    /// Refractive-index structure constant Cn² (m^-2/3)
    #[arg(long)]
    cn2: Option<f64>,

    /// Number of phase screens
    #[arg(long)]
    num_screens: Option<usize>,

    /// Receiver aperture diameter D (m)
    #[arg(short = 'D', long)]
    aperture_diameter: Option<f64>,

    /// Outer scale L0 (m)
    #[arg(long)]
    outer_scale: Option<f64>,

    /// Inner scale l0 (m)
    #[arg(long)]
    inner_scale: Option<f64>,

    /// Power-law exponent (11/3 for Kolmogorov)
    #[arg(long)]
    alpha: Option<f64>,

    /// Anisotropy magnitude
    #[arg(long)]
    anisotropy: Option<f64>,

    /// Anisotropy rotation (degrees)
    #[arg(long)]
    rotation_deg: Option<f64>,

    /// Subharmonic orders for ft_sh
    #[arg(long)]
    subharmonic_orders: Option<usize>,

    /// Screen method (vacuum, ft, ft_sh)
    #[arg(short = 'm', long)]
    screen_method: Option<String>,

    /// PSD model (kolmogorov, vonKarman, modified_vonKarman)
    #[arg(short, long)]
    psd: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut SimulationConfig) {
        macro_rules! override_with {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        override_with!(
            grid_size,
            source_pitch,
            receiver_pitch,
            wavelength,
            path_length,
            cn2,
            num_screens,
            aperture_diameter,
            outer_scale,
            inner_scale,
            alpha,
            anisotropy,
            rotation_deg,
            subharmonic_orders,
            screen_method,
            psd
        );
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SimulationConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(SimulationConfig::default()),
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args.config.as_ref())?;
    args.overrides.apply(&mut config);
    if args.no_subharmonics {
        config.subharmonics = false;
    }
    let n = config.grid_size;

    println!("=== Turbulence Propagation Demo ===\n");
    let mut sim = Simulation::new(config)?;
    if let Some(rytov) = args.rytov {
        sim.set_rytov_number(rytov)?;
    }

    let config = sim.config();
    let derived = sim.derived();
    println!(
        "Grid: {}x{}, dx={:.3e}m, Rdx={:.3e}m, side={:.3}m",
        n,
        n,
        config.source_pitch,
        config.receiver_pitch,
        n as f64 * config.source_pitch
    );
    println!(
        "Path: {:.1}m, {} screens, wavelength={:.3e}m, Cn2={:.3e}",
        config.path_length, config.num_screens, config.wavelength, config.cn2
    );
    println!(
        "Turbulence: r0={:.4}m, r0/screen={:.4}m, Rytov variance={:.4}, rho0={:.4}m",
        derived.r0, derived.r0_screen, derived.rytov_variance, derived.coherence_radius
    );
    println!(
        "Method: {}, PSD: {}\n",
        sim.atmosphere_config().method.name(),
        config.psd
    );

    // Unit-amplitude plane wave
    let source = Array2::from_elem((n, n), Complex64::new(1.0, 0.0));
    let source_power: f64 = source.iter().map(|u| u.norm_sqr()).sum();

    let field = if args.vacuum {
        println!("Propagating in vacuum...");
        sim.run_vacuum(&source)?
    } else {
        println!("Propagating through turbulence (seed {})...", args.seed);
        let output = sim.run(&source, &mut StdRng::seed_from_u64(args.seed))?;
        for (index, screen) in output.screens.iter().enumerate() {
            let phase = screen.phase();
            let mean = phase.mean().unwrap_or(0.0);
            let rms = phase.mapv(|p| (p - mean).powi(2)).mean().unwrap_or(0.0).sqrt();
            println!(
                "  Screen {:>3}: pitch={:.3e}m, phase rms={:.3} rad",
                index + 1,
                screen.pitch(),
                rms
            );
        }
        output.field
    };

    let intensity = field.mapv(|u| u.norm_sqr());
    let power: f64 = intensity.sum();
    let peak = intensity.iter().copied().fold(0.0_f64, f64::max);
    println!("\n=== Receiver Plane ===");
    println!("Power ratio:          {:.4}", power / source_power);
    println!("Peak intensity:       {:.4}", peak);
    println!("On-axis intensity:    {:.4}", intensity[[n / 2, n / 2]]);
    println!(
        "Scintillation index:  {:.4} (aperture {:.3}m)",
        sim.scintillation_index(&field),
        config.aperture_diameter
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
