//! Cellarium - CLI Entry Point
//!
//! Headless runner for the cell population simulator.

use cellarium::genealogy::Genealogy;
use cellarium::{benchmark, Config, World};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cellarium")]
#[command(version)]
#[command(about = "Steering-driven cell population simulator with genealogy tracking")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a new simulation
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Output directory for the genealogy and stats exports
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of ticks
        #[arg(short, long, default_value = "1000")]
        ticks: u64,

        /// Population size
        #[arg(short, long, default_value = "200")]
        population: usize,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Summarize a genealogy export
    Analyze {
        /// Genealogy JSON file
        genealogy: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Config may carry a log level; RUST_LOG still wins
    let log_level = match &cli.command {
        Commands::Run { config, .. } if config.exists() => Config::from_file(config)
            .map(|c| c.logging.log_level)
            .unwrap_or_else(|_| "info".to_string()),
        _ => "info".to_string(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            output,
            seed,
            quiet,
        } => run_simulation(config, ticks, output, seed, quiet),

        Commands::Benchmark { ticks, population } => run_benchmark(ticks, population),

        Commands::Init { output } => generate_config(output),

        Commands::Analyze { genealogy } => analyze_genealogy(genealogy),
    }
}

fn run_simulation(
    config_path: PathBuf,
    ticks: u64,
    output: PathBuf,
    seed: Option<u64>,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load or create config
    let config = if config_path.exists() {
        println!("Loading config from: {:?}", config_path);
        Config::from_file(&config_path)?
    } else {
        println!("Using default configuration");
        Config::default()
    };

    std::fs::create_dir_all(&output)?;

    let mut world = if let Some(s) = seed {
        println!("Using seed: {}", s);
        World::new_with_seed(config.clone(), s)?
    } else {
        World::new(config.clone())?
    };

    println!("Starting simulation");
    println!("  Initial population: {}", world.population());
    println!("  Arena: {}x{}", config.world.width, config.world.height);
    println!("  Ticks: {} ({:.0}s simulated)", ticks, ticks as f64 * config.world.dt as f64);
    println!();

    let start = Instant::now();
    let stats_interval = config.logging.stats_interval.max(1);

    for i in 0..ticks {
        world.step();

        if !quiet && i % stats_interval == 0 {
            println!("{}", world.stats.summary());
        }

        if world.is_extinct() {
            println!("\nPopulation extinct at tick {}", world.tick());
            break;
        }
    }

    let elapsed = start.elapsed();
    let ticks_per_sec = world.tick() as f64 / elapsed.as_secs_f64().max(1e-9);
    let tree = world.genealogy().stats();

    println!();
    println!("=== Simulation Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Ticks: {}", world.tick());
    println!("Speed: {:.1} ticks/s", ticks_per_sec);
    println!("Final population: {}", world.population());
    println!("Max generation: {}", tree.max_generation);
    println!("Agents ever born: {}", tree.node_count);

    let genealogy_path = output.join("genealogy.json");
    world.genealogy().save(&genealogy_path)?;
    println!("Genealogy: {:?}", genealogy_path);

    let stats_path = output.join("stats_history.json");
    world.stats_history.save(&stats_path)?;
    println!("Stats history: {:?}", stats_path);

    Ok(())
}

fn run_benchmark(ticks: u64, population: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Cellarium Benchmark ===");
    println!("Ticks: {}", ticks);
    println!("Population: {}", population);
    println!();

    let result = benchmark(ticks, population)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn analyze_genealogy(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Genealogy Analysis ===");
    println!("File: {:?}", path);
    println!();

    let json = std::fs::read_to_string(&path)?;
    let genealogy = Genealogy::from_json(&json)?;
    let stats = genealogy.stats();

    println!("Nodes: {}", stats.node_count);
    println!("Founders: {}", stats.root_count);
    println!("Without offspring: {}", stats.leaf_count);
    println!("Still alive at export: {}", stats.alive_count);
    println!("Max generation: {}", stats.max_generation);

    let mut per_generation: BTreeMap<u32, usize> = BTreeMap::new();
    let mut lifespans = Vec::new();
    for node in genealogy.nodes() {
        *per_generation.entry(node.generation).or_insert(0) += 1;
        if let Some(age) = node.age_at_death {
            lifespans.push(age);
        }
    }

    println!();
    println!("Agents per generation:");
    for (generation, count) in &per_generation {
        println!("  {:3}: {}", generation, count);
    }

    if !lifespans.is_empty() {
        let mean = lifespans.iter().sum::<f32>() / lifespans.len() as f32;
        println!();
        println!("Mean lifespan: {:.1}s over {} deaths", mean, lifespans.len());
    }

    if let Some(prolific) = genealogy.nodes().max_by_key(|n| n.children.len()) {
        if !prolific.children.is_empty() {
            println!(
                "Most children: {} (#{}) with {}",
                prolific.name,
                prolific.id,
                prolific.children.len()
            );
        }
    }

    Ok(())
}
