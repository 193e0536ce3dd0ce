use std::path::PathBuf;
use structopt::StructOpt;
use ovm_plasma::config::Config;
use ovm_plasma::init_logger;
use log::{info, error};

#[derive(Debug, StructOpt)]
#[structopt(name = "ovm-plasma-config", about = "OVM Plasma configuration tool")]
struct Opt {
    /// Generate a default configuration
    #[structopt(long)]
    generate: bool,

    /// Output file
    #[structopt(long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Input file
    #[structopt(long, parse(from_os_str))]
    input: Option<PathBuf>,

    /// Data directory
    #[structopt(long)]
    data_dir: Option<String>,

    /// Delay between blocks in milliseconds
    #[structopt(long)]
    block_interval_ms: Option<u64>,

    /// Comma separated deposit contract addresses
    #[structopt(long)]
    deposit_contracts: Option<String>,

    /// Keep the database in memory
    #[structopt(long)]
    in_memory: bool,
}

fn print_config(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(config_str) => {
            println!("{}", config_str);
        },
        Err(e) => {
            error!("Failed to serialize configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    // Initialize logger
    init_logger("info");

    // Parse command line arguments
    let opt = Opt::from_args();

    // Generate a default configuration
    if opt.generate {
        let mut config = Config::default();

        // Update config with command line arguments
        if let Some(data_dir) = opt.data_dir {
            config = config.with_data_dir(&data_dir);
        }

        if let Some(block_interval_ms) = opt.block_interval_ms {
            config.aggregator.block_interval_ms = block_interval_ms;
        }

        if let Some(deposit_contracts) = opt.deposit_contracts {
            config.aggregator.deposit_contracts = deposit_contracts
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if opt.in_memory {
            config.storage.in_memory = true;
        }

        if let Err(e) = config.aggregator.validate() {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }

        // Save the configuration
        if let Some(output) = opt.output {
            match config.save(&output) {
                Ok(_) => {
                    info!("Configuration saved to {:?}", output);
                },
                Err(e) => {
                    error!("Failed to save configuration: {}", e);
                    std::process::exit(1);
                }
            }
        } else {
            // Print the configuration to stdout
            print_config(&config);
        }
    } else if let Some(input) = opt.input {
        // Load the configuration
        match Config::load(&input) {
            Ok(config) => print_config(&config),
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        // Print help
        if Opt::clap().print_help().is_err() {
            std::process::exit(1);
        }
        println!();
    }
}
