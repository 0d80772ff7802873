use std::process::ExitCode;
use std::time::Instant;

use chime::ChimeError;
use chime::config::ChimeConfig;
use chime::regions::RegionCache;
use chime::run::{RunInput, project, write_outputs};
use chime_mrp::Environment;
use log::{error, info};

/// Runs every selected region. Returns false if any region was rejected.
fn run() -> Result<bool, ChimeError> {
    let env = Environment::<RunInput>::load()?;
    let config: ChimeConfig = env.read_toml("config")?.unwrap_or_default();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    let source = config.regions.source(env.file("regions"))?;
    let mut cache = RegionCache::new(config.regions.cache_ttl());
    let today = chrono::Local::now().date_naive();

    let mut rejected = 0;
    for city in env.input.selections() {
        let table = cache.get_or_load(Instant::now(), || source.load())?;
        match project(&env.input, city, table, &config.defaults, today) {
            Ok(model) => {
                write_outputs(&env, city.unwrap_or_default(), &model, env.input.table_modulo)?
            }
            Err(e) => {
                // Other regions still run.
                rejected += 1;
                error!("{}: {e}", city.unwrap_or("<no region>"));
                eprintln!("Configuration error: {e}");
            }
        }
    }
    info!("done, {rejected} region(s) rejected");
    Ok(rejected == 0)
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(ChimeError::Configuration(e)) => {
            eprintln!("Configuration error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
