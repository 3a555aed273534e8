//! Wolkenbase command line
//!
//! Generates a synthetic scene, ingests it into a block store, scans it tile
//! by tile and prints a report.

use anyhow::{anyhow, Context};
use clap::{Arg, ArgAction, Command};
use wolkenbase::scenes::scene_by_name;
use wolkenbase::{init_tracing, run, Config, Error};
use wolkenbase_core::core::{load_config, load_config_or_default};

fn main() -> anyhow::Result<()> {
    let matches = Command::new("wolkenbase")
        .version(wolkenbase::VERSION)
        .about("Out-of-core block store and tile scanner for LIDAR point clouds.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for the block files")
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .value_name("N")
                .help("Number of worker threads, 0 for one per CPU")
        )
        .arg(
            Arg::new("files")
                .long("files")
                .value_name("N")
                .help("Number of block files")
        )
        .arg(
            Arg::new("buffers")
                .long("buffers")
                .value_name("N")
                .help("Buffer pool capacity in blocks")
        )
        .arg(
            Arg::new("spacing")
                .long("spacing")
                .value_name("METRES")
                .help("Distance between tile centers")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("scene")
                .long("scene")
                .value_name("NAME")
                .default_value("street")
                .help("Synthetic scene (flat, wavy, street)")
        )
        .arg(
            Arg::new("radius")
                .long("radius")
                .value_name("METRES")
                .default_value("50")
                .help("Radius of the scene")
        )
        .arg(
            Arg::new("density")
                .long("density")
                .value_name("PER_M2")
                .default_value("10")
                .help("Points per square metre")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("N")
                .help("Random seed of the scene")
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the report as JSON")
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .action(ArgAction::SetTrue)
                .help("Print the effective configuration as TOML and exit")
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => load_config(path).with_context(|| format!("loading {}", path))?,
        None => load_config_or_default(None),
    };
    config.apply_env_overrides()?;
    apply_cli_overrides(&mut config, &matches)?;

    if matches.get_flag("print-config") {
        print!("{}", toml::to_string(&config).context("serialising configuration")?);
        return Ok(());
    }

    init_tracing(&config.logging.level)?;

    let scene_name = matches.get_one::<String>("scene").map(String::as_str).unwrap_or("street");
    let radius = parse_arg::<f64>(&matches, "radius")?.unwrap_or(50.0);
    let density = parse_arg::<f64>(&matches, "density")?.unwrap_or(10.0);
    let mut scene = scene_by_name(scene_name, radius, density)
        .ok_or_else(|| anyhow!("unknown scene {:?}", scene_name))?;
    if let Some(seed) = parse_arg::<u64>(&matches, "seed")? {
        scene = scene.with_seed(seed);
    }

    tracing::info!(
        "Scene {} radius {} m, {} points, data in {}",
        scene_name,
        radius,
        scene.remaining(),
        config.store.data_dir.display()
    );
    let report = run(config, scene).context("pipeline failed")?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("source           {}", report.source);
        println!("points ingested  {}", report.points_ingested);
        println!("points stored    {}", report.stored_points);
        println!("blocks           {}", report.blocks);
        println!("tiles            {}", report.tiles);
        if let (Some(min), Some(max)) = (report.min_tile, report.max_tile) {
            println!("density          {:.3} .. {:.3} per m2", min.density, max.density);
            println!("height           {:.3} .. {:.3} m", min.height, max.height);
        }
        println!("buffers flushed  {}", report.flushed);
        println!("elapsed          {} ms", report.elapsed_ms);
    }
    if report.anomalies.total() > 0 {
        eprintln!(
            "warning: {} duplicate, {} missing, {} out-of-bounds points, {} outside the declared bounds",
            report.anomalies.duplicate_points,
            report.anomalies.missing_points,
            report.anomalies.out_of_bounds_points,
            report.anomalies.outside_declared_points
        );
    }
    Ok(())
}

fn parse_arg<T>(matches: &clap::ArgMatches, name: &str) -> Result<Option<T>, Error>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    matches
        .get_one::<String>(name)
        .map(|s| s.parse::<T>().map_err(|e| Error::config(format!("Invalid {}: {}", name, e))))
        .transpose()
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &clap::ArgMatches) -> Result<(), Error> {
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.store.data_dir = data_dir.into();
    }
    if let Some(threads) = parse_arg(matches, "threads")? {
        config.scheduler.worker_threads = threads;
    }
    if let Some(files) = parse_arg(matches, "files")? {
        config.store.file_count = files;
    }
    if let Some(buffers) = parse_arg(matches, "buffers")? {
        config.store.buffer_capacity = buffers;
    }
    if let Some(spacing) = parse_arg(matches, "spacing")? {
        config.traversal.spacing = spacing;
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }
    Ok(())
}
