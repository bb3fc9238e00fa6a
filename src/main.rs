use anyhow::{anyhow, Result};
use vigil_sim::cli::{print_help, CliOptions};
use vigil_sim::config::SimConfig;
use vigil_sim::harness::{load_fixture, run_fixture};

fn main() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_secs()
        .try_init();
    let options = match CliOptions::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if options.help {
        print_help();
        return;
    }
    if let Err(err) = run(&options) {
        eprintln!("[harness] error: {err:?}");
        std::process::exit(1);
    }
}

fn run(options: &CliOptions) -> Result<()> {
    let fixture_path = options.fixture.as_ref().ok_or_else(|| anyhow!("--fixture is required"))?;
    let mut config = match &options.config {
        Some(path) => SimConfig::load_or_default(path),
        None => SimConfig::default(),
    };
    config.apply_overrides(&options.config_overrides());

    let mut fixture = load_fixture(fixture_path)?;
    if let Some(steps) = options.steps {
        fixture.steps = steps;
    }
    if let Some(dt) = options.dt {
        fixture.dt = dt;
    }
    if options.seed.is_some() {
        fixture.seed = options.seed;
    }
    let output = run_fixture(&fixture, &config)?;
    serde_json::to_writer_pretty(std::io::stdout(), &output)?;
    println!();
    Ok(())
}
