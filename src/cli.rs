use crate::config::ConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "fixtures/clip_preview.json";
const DEFAULT_DURATION: f32 = 2.0;
const DEFAULT_STEP: f32 = 1.0 / 60.0;

/// Flags accepted by the `clip_check` preview tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipCheckOptions {
    pub config: PathBuf,
    pub duration: f32,
    pub step: f32,
    speed: Option<f32>,
    autoplay: Option<String>,
}

impl Default for ClipCheckOptions {
    fn default() -> Self {
        Self {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            duration: DEFAULT_DURATION,
            step: DEFAULT_STEP,
            speed: None,
            autoplay: None,
        }
    }
}

impl ClipCheckOptions {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = ClipCheckOptions::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // program name
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name <value>.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => options.config = PathBuf::from(value),
                "duration" => options.duration = parse_seconds("duration", &value)?,
                "step" => {
                    let step = parse_seconds("step", &value)?;
                    if step <= 0.0 {
                        bail!("Invalid step '{value}'. The step must be greater than zero.");
                    }
                    options.step = step;
                }
                "speed" => {
                    let speed = value.parse::<f32>().with_context(|| format!("Invalid speed '{value}'"))?;
                    if !speed.is_finite() {
                        bail!("Invalid speed '{value}'. Use a finite number.");
                    }
                    options.speed = Some(speed);
                }
                "autoplay" => options.autoplay = Some(value),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --duration, --step, --speed, --autoplay."
                ),
            }
        }
        Ok(options)
    }

    pub fn config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides { speed: self.speed, autoplay: self.autoplay.clone() }
    }

    /// Number of fixed steps covering `duration`.
    pub fn step_count(&self) -> usize {
        (self.duration / self.step).ceil().max(0.0) as usize
    }
}

fn parse_seconds(flag: &str, value: &str) -> Result<f32> {
    let seconds = value.parse::<f32>().with_context(|| format!("Invalid {flag} '{value}'"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        bail!("Invalid {flag} '{value}'. Use a non-negative number of seconds.");
    }
    Ok(seconds)
}
