use mimalloc::MiMalloc;

use glance::config::{load_config, ExperimentsConfig};
use glance::error::Result;
use glance::experiments::{run_glance, run_glance_encoded, run_pretrain, ExperimentReport};
use glance::models::FeatureMode;

use clap::{value_parser, Arg, ArgMatches, Command};
use log::{error, info};
use std::path::PathBuf;
use std::process;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// ------------------------------
// Command line
// ------------------------------

fn common_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("config")
            .long("config")
            .short('c')
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .help("JSON experiment configuration"),
    )
    .arg(
        Arg::new("data-dir")
            .long("data-dir")
            .short('d')
            .value_name("DIR")
            .value_parser(value_parser!(PathBuf))
            .help("Directory holding the four uncompressed MNIST idx files"),
    )
    .arg(
        Arg::new("epochs")
            .long("epochs")
            .short('e')
            .value_name("N")
            .value_parser(value_parser!(usize))
            .help("Number of training epochs"),
    )
    .arg(
        Arg::new("seed")
            .long("seed")
            .value_name("SEED")
            .value_parser(value_parser!(u64))
            .help("Seed for weight initialisation and shuffling"),
    )
    .arg(
        Arg::new("train-limit")
            .long("train-limit")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .help("Use only the first N training images"),
    )
    .arg(
        Arg::new("test-limit")
            .long("test-limit")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .help("Use only the first N test images"),
    )
}

fn model_arg() -> Arg {
    Arg::new("model")
        .long("model")
        .short('m')
        .value_name("STEM")
        .value_parser(value_parser!(PathBuf))
        .help("Autoencoder path stem (.json and .bin are appended)")
}

fn cli() -> Command {
    Command::new("glance")
        .version(env!("CARGO_PKG_VERSION"))
        .about("IRNN on sequences of MNIST windows, raw or autoencoder-featurized")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(common_args(
            Command::new("glance")
                .about("Train an IRNN on raw pixel windows")
                .arg(
                    Arg::new("window-size")
                        .long("window-size")
                        .short('w')
                        .value_name("W")
                        .value_parser(value_parser!(usize))
                        .help("Side of the square window"),
                ),
        ))
        .subcommand(common_args(
            Command::new("pretrain")
                .about("Train the window autoencoder and save it")
                .arg(
                    Arg::new("window-size")
                        .long("window-size")
                        .short('w')
                        .value_name("W")
                        .value_parser(value_parser!(usize))
                        .help("Side of the square window"),
                )
                .arg(model_arg()),
        ))
        .subcommand(common_args(
            Command::new("glance-encoded")
                .about("Train an IRNN on autoencoder features of each window")
                .arg(
                    Arg::new("window-size")
                        .long("window-size")
                        .short('w')
                        .value_name("W")
                        .value_parser(value_parser!(usize))
                        .help("Side of the square window (default: from the stored autoencoder)"),
                )
                .arg(model_arg())
                .arg(
                    Arg::new("feature-mode")
                        .long("feature-mode")
                        .value_name("MODE")
                        .value_parser(["reconstruction", "bottleneck"])
                        .help("Which autoencoder output featurizes a window"),
                ),
        ))
}

// ------------------------------
// Overrides on top of the config file
// ------------------------------

fn base_config(matches: &ArgMatches) -> Result<ExperimentsConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            info!("Reading configuration from {}", path.display());
            load_config(path)
        }
        None => Ok(ExperimentsConfig::default()),
    }
}

macro_rules! apply_common {
    ($section:expr, $m:expr) => {{
        if let Some(dir) = $m.get_one::<PathBuf>("data-dir") {
            $section.data_dir = dir.clone();
        }
        if let Some(&epochs) = $m.get_one::<usize>("epochs") {
            $section.epochs = epochs;
        }
        if let Some(&seed) = $m.get_one::<u64>("seed") {
            $section.seed = seed;
        }
        if let Some(&n) = $m.get_one::<usize>("train-limit") {
            $section.train_limit = Some(n);
        }
        if let Some(&n) = $m.get_one::<usize>("test-limit") {
            $section.test_limit = Some(n);
        }
    }};
}

fn report(name: &str, r: &ExperimentReport) {
    match r.test.accuracy {
        Some(acc) => info!(
            "{} finished after {} epochs: test loss {:.4}, test accuracy {:.4}",
            name,
            r.history.len(),
            r.test.loss,
            acc
        ),
        None => info!(
            "{} finished after {} epochs: test loss {:.6}",
            name,
            r.history.len(),
            r.test.loss
        ),
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("glance", m)) => {
            let mut cfg = base_config(m)?.glance;
            apply_common!(cfg, m);
            if let Some(&w) = m.get_one::<usize>("window-size") {
                cfg.window_size = w;
            }
            report("glance", &run_glance(&cfg)?);
        }
        Some(("pretrain", m)) => {
            let mut cfg = base_config(m)?.autoencoder;
            apply_common!(cfg, m);
            if let Some(&w) = m.get_one::<usize>("window-size") {
                cfg.window_size = w;
            }
            if let Some(stem) = m.get_one::<PathBuf>("model") {
                cfg.model_path = stem.clone();
            }
            report("pretrain", &run_pretrain(&cfg)?);
        }
        Some(("glance-encoded", m)) => {
            let mut cfg = base_config(m)?.glance_encoded;
            apply_common!(cfg, m);
            if let Some(&w) = m.get_one::<usize>("window-size") {
                cfg.window_size = Some(w);
            }
            if let Some(stem) = m.get_one::<PathBuf>("model") {
                cfg.model_path = stem.clone();
            }
            if let Some(mode) = m.get_one::<String>("feature-mode") {
                cfg.feature_mode = match mode.as_str() {
                    "bottleneck" => FeatureMode::Bottleneck,
                    _ => FeatureMode::Reconstruction,
                };
            }
            report("glance-encoded", &run_glance_encoded(&cfg)?);
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        error!("{}", e);
        process::exit(1);
    }
}
