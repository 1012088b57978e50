//! Binding generator binary.
//!
//! Reads a descriptor table and writes `<surface>_functions.h` and
//! `<surface>_functions.cpp` for every requested surface.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::LevelFilter;
use torch_funcgen::{
    DirectorySink, GenError, GenResult, Generator, GeneratorConfig, MissingBasePolicy, Surface, YamlSource,
};

#[derive(Parser)]
#[command(
    name = "funcgen",
    about = "Generate Ruby tensor bindings from the native operator descriptor table",
    version
)]
struct Cli {
    /// Descriptor table (YAML), or `-` for stdin
    input: PathBuf,

    /// Directory receiving the generated units
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Surface to generate (repeatable; default: all)
    #[arg(long = "surface", value_name = "SURFACE")]
    surfaces: Vec<Surface>,

    /// Dispatch out-only overload groups instead of failing
    #[arg(long)]
    allow_missing_base: bool,

    /// Cast registered functions for Ruby < 2.7 hosts
    #[arg(long)]
    legacy_method_cast: bool,

    /// Prefix of the registration entry points
    #[arg(long, default_value = "add")]
    registration_prefix: String,

    /// Generate and report without writing files
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn config(&self) -> GeneratorConfig {
        let surfaces = if self.surfaces.is_empty() {
            Surface::ALL.to_vec()
        } else {
            self.surfaces.clone()
        };
        GeneratorConfig {
            missing_base: if self.allow_missing_base {
                MissingBasePolicy::Warn
            } else {
                MissingBasePolicy::Error
            },
            registration_prefix: self.registration_prefix.clone(),
            legacy_method_cast: self.legacy_method_cast,
            surfaces,
        }
    }

    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn read_input(path: &Path) -> GenResult<String> {
    let io_error = |source| GenError::Io {
        path: path.to_path_buf(),
        source,
    };
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(io_error)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path).map_err(io_error)
    }
}

fn run(cli: &Cli) -> GenResult<()> {
    let text = read_input(&cli.input)?;
    let source = YamlSource::new(&text);
    let generator = Generator::new(cli.config());

    let stats = if cli.dry_run {
        generator.generate(&source)?.stats
    } else {
        generator.run(&source, &mut DirectorySink::new(&cli.out_dir))?
    };
    print!("{}", stats);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
