use crate::config::SimOverrides;
use anyhow::{anyhow, bail, Context, Result};
use glam::Vec2;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CliOptions {
    pub fixture: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub steps: Option<usize>,
    pub dt: Option<f32>,
    pub seed: Option<u64>,
    pub gravity: Option<Vec2>,
    pub help: bool,
}

impl CliOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = CliOptions::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if flag == "--help" || flag == "-h" {
                options.help = true;
                continue;
            }
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Use --fixture/--config/--steps/--dt/--seed/--gravity with values.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "fixture" => options.fixture = Some(PathBuf::from(value)),
                "config" => options.config = Some(PathBuf::from(value)),
                "steps" => {
                    options.steps =
                        Some(value.parse::<usize>().with_context(|| format!("Invalid steps '{value}'"))?);
                }
                "dt" => {
                    let dt = value.parse::<f32>().with_context(|| format!("Invalid dt '{value}'"))?;
                    if dt <= 0.0 {
                        bail!("dt must be positive, got {dt}");
                    }
                    options.dt = Some(dt);
                }
                "seed" => {
                    options.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "gravity" => options.gravity = Some(parse_vec2_flag("gravity", &value)?),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --fixture, --config, --steps, --dt, --seed, --gravity."
                ),
            }
        }
        Ok(options)
    }

    pub fn config_overrides(&self) -> SimOverrides {
        SimOverrides { seed: self.seed, gravity: self.gravity }
    }
}

pub fn print_help() {
    println!(
        "Usage: vigil_sim --fixture <path> [--config <path>] [--steps <n>] [--dt <seconds>] [--seed <u64>] [--gravity <x,y>]"
    );
    println!("  --fixture   Scenario fixture JSON to run");
    println!("  --config    Simulation config JSON (defaults are used when omitted)");
    println!("  --steps     Override the fixture's frame count");
    println!("  --dt        Override the fixture's frame delta");
    println!("  --seed      Seed for wander/drop randomness");
    println!("  --gravity   Gravity in m/s^2 as x,y (e.g. 0,-9.81)");
}

fn parse_vec2_flag(flag: &str, value: &str) -> Result<Vec2> {
    let Some((x, y)) = value.split_once(',') else {
        bail!("Invalid {flag} value '{value}'. Use x,y.");
    };
    let x = x.trim().parse::<f32>().with_context(|| format!("Invalid {flag} x component '{x}'"))?;
    let y = y.trim().parse::<f32>().with_context(|| format!("Invalid {flag} y component '{y}'"))?;
    Ok(Vec2::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixture_steps_and_seed() {
        let args = ["sim", "--fixture", "demo.json", "--steps", "120", "--seed", "9"];
        let options = CliOptions::parse(args).expect("parse options");
        assert_eq!(options.fixture, Some(PathBuf::from("demo.json")));
        assert_eq!(options.steps, Some(120));
        assert_eq!(options.config_overrides().seed, Some(9));
    }

    #[test]
    fn gravity_flag_feeds_config_overrides() {
        let options = CliOptions::parse(["sim", "--gravity", "0, -20"]).expect("parse options");
        assert_eq!(options.config_overrides().gravity, Some(Vec2::new(0.0, -20.0)));
        let err = CliOptions::parse(["sim", "--gravity", "down"]).unwrap_err();
        assert!(err.to_string().contains("x,y"));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["sim", "--steps", "10", "--steps", "30"];
        let options = CliOptions::parse(args).expect("parse options");
        assert_eq!(options.steps, Some(30));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOptions::parse(["sim", "--steps"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_bad_dt() {
        let err = CliOptions::parse(["sim", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOptions::parse(["sim", "--dt", "0"]).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }
}
