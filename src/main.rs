use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use dotbuild::config::{self, BUILD_OPTIONS, BuildOption, BuilderConfig};
use dotbuild::{Builder, DefaultBuilder};

/// Exit code for a build option that is not in the list.
const EXIT_UNRECOGNIZED: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, after_help = build_options_help())]
struct Args {
    /// What to do, see the list below
    #[arg(value_name = "BUILD_OPTION")]
    build_option: Option<String>,

    /// Same as --sysroot
    #[arg(value_name = "SYSROOT_DIR")]
    sysroot_dir: Option<PathBuf>,

    /// Build a native (AOT) application. Cross builds then need a sysroot
    #[arg(short, long)]
    native: bool,

    /// Sysroot used for cross compilation
    #[arg(short, long, value_name = "DIR")]
    sysroot: Option<PathBuf>,

    /// Copy the published application here, created if missing
    #[arg(short, long, value_name = "DIR")]
    install: Option<PathBuf>,

    /// Project directory [default: current directory]
    #[arg(short, long, value_name = "DIR")]
    project: Option<PathBuf>,

    /// Defaults from a .toml or .yaml file
    #[arg(short, long)]
    config: Option<String>,

    /// Print diagnostic output
    #[arg(short, long)]
    verbose: bool,
}

fn build_options_help() -> String {
    let mut help = String::from("Possible values for <BUILD_OPTION> are the following:\n");
    for (key, _) in BUILD_OPTIONS {
        help.push_str(&format!("  {}\n", key));
    }
    help.push_str(
        "\nAny cross platform build option that contains ':' requires clang, \
         and a sysroot when combined with --native.",
    );
    help
}

fn main() -> Result<ExitCode>
{
    let args = Args::parse();
    let level = if args.verbose { log::Level::Debug } else { log::Level::Warn };
    simple_logger::init_with_level(level)?;

    let Some(token) = args.build_option.as_deref() else {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let option: BuildOption = match token.parse() {
        Ok(option) => option,
        Err(e) => {
            println!("{}! See {} --help", e, Args::command().get_name());
            return Ok(ExitCode::from(EXIT_UNRECOGNIZED));
        }
    };

    let root = match args.project {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    // `.` and `..` have no basename to derive the project name from.
    let root = match root.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => root,
    };
    let mut config = BuilderConfig::new(root);
    config.native = args.native;
    config.sysroot = args.sysroot.or(args.sysroot_dir);
    config.install_dir = args.install;

    if let Some(path) = &args.config {
        info!("Loading configuration from {}...", path);
        let file = config::load_config(path)
            .with_context(|| format!("failed to load configuration from {}", path))?;
        config = config.merge_file(&file);
    }

    info!("Running {} in {}", option, config.root.display());
    let mut builder = Builder::from_system(config);
    let success = builder.is_valid() && builder.run(option);
    builder.log();

    if success {
        Ok(ExitCode::SUCCESS)
    } else {
        println!("failure");
        Ok(ExitCode::FAILURE)
    }
}
