//! Run configuration loaded from `ta-marking.toml`.
//!
//! [`MarkingConfig`] holds the simulated timings and the defaults the CLI
//! falls back to. Keys missing from the file use the defaults below. The
//! `TA_MARKING_SEED` environment variable takes precedence over the file's
//! `seed`.

use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::MarkingError;

const CONFIG_FILE: &str = "ta-marking.toml";
const SEED_ENV: &str = "TA_MARKING_SEED";

/// Inclusive range of simulated milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draws a uniform delay and stretches it by `time_scale`.
    pub fn sample(&self, rng: &mut impl Rng, time_scale: f64) -> Duration {
        let ms = rng.gen_range(self.min_ms..=self.max_ms);
        scaled(ms, time_scale).unwrap_or(Duration::MAX)
    }
}

/// `ms` stretched by `time_scale`, or `None` when that does not fit in a
/// [`Duration`].
fn scaled(ms: u64, time_scale: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(Duration::from_millis(ms).as_secs_f64() * time_scale).ok()
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkingConfig {
    /// TA count used when the CLI does not give one.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Thinking time per rubric line.
    #[serde(default = "default_review_delay")]
    pub review_delay_ms: DelayRange,

    /// Grading time per question.
    #[serde(default = "default_mark_delay")]
    pub mark_delay_ms: DelayRange,

    /// Pause between read and write in the racy store; 0 only yields.
    #[serde(default)]
    pub race_window_ms: u64,

    /// Chance that a TA corrects a rubric line it reviews.
    #[serde(default = "default_correction_probability")]
    pub correction_probability: f64,

    /// Multiplier applied to every simulated delay.
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// RNG seed; a fresh one is drawn per run when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_workers() -> usize {
    3
}

fn default_review_delay() -> DelayRange {
    DelayRange::new(500, 1000)
}

fn default_mark_delay() -> DelayRange {
    DelayRange::new(1000, 2000)
}

fn default_correction_probability() -> f64 {
    0.5
}

fn default_time_scale() -> f64 {
    1.0
}

impl Default for MarkingConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            review_delay_ms: default_review_delay(),
            mark_delay_ms: default_mark_delay(),
            race_window_ms: 0,
            correction_probability: default_correction_probability(),
            time_scale: default_time_scale(),
            seed: None,
        }
    }
}

impl MarkingConfig {
    /// Loads `ta-marking.toml` from the current directory, or `path` when
    /// given. A missing default file yields the defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, MarkingError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(raw) = std::env::var(SEED_ENV).ok().filter(|raw| !raw.trim().is_empty()) {
            let seed = raw
                .trim()
                .parse()
                .map_err(|_| MarkingError::Config(format!("{SEED_ENV} is not a u64: {raw}")))?;
            config.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, MarkingError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MarkingError::io(path, e))?;
        Ok(toml::from_str::<MarkingConfig>(&contents)?)
    }

    pub fn validate(&self) -> Result<(), MarkingError> {
        for (name, range) in [
            ("review_delay_ms", self.review_delay_ms),
            ("mark_delay_ms", self.mark_delay_ms),
        ] {
            if range.min_ms > range.max_ms {
                return Err(MarkingError::Config(format!(
                    "{name}: min_ms ({}) is greater than max_ms ({})",
                    range.min_ms, range.max_ms
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.correction_probability) {
            return Err(MarkingError::Config(format!(
                "correction_probability must be within [0, 1], got {}",
                self.correction_probability
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(MarkingError::Config(format!(
                "time_scale must be a non-negative number, got {}",
                self.time_scale
            )));
        }
        for (name, ms) in [
            ("review_delay_ms", self.review_delay_ms.max_ms),
            ("mark_delay_ms", self.mark_delay_ms.max_ms),
            ("race_window_ms", self.race_window_ms),
        ] {
            if scaled(ms, self.time_scale).is_none() {
                return Err(MarkingError::Config(format!(
                    "{name} ({ms}) scaled by time_scale {} overflows",
                    self.time_scale
                )));
            }
        }
        Ok(())
    }

    pub fn race_window(&self) -> Duration {
        scaled(self.race_window_ms, self.time_scale).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn default_config_values() {
        let config = MarkingConfig::default();
        assert_eq!(config.workers, 3);
        assert_eq!(config.review_delay_ms, DelayRange::new(500, 1000));
        assert_eq!(config.mark_delay_ms, DelayRange::new(1000, 2000));
        assert_eq!(config.race_window_ms, 0);
        assert_eq!(config.correction_probability, 0.5);
        assert_eq!(config.time_scale, 1.0);
        assert!(config.seed.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            workers = 4
            time_scale = 0.01
            mark_delay_ms = { min_ms = 10, max_ms = 20 }
        "#;
        let config: MarkingConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.time_scale, 0.01);
        assert_eq!(config.mark_delay_ms, DelayRange::new(10, 20));
        assert_eq!(config.review_delay_ms, DelayRange::new(500, 1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_reads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "race_window_ms = 25\nseed = 7\n").unwrap();

        let config = MarkingConfig::load(Some(&path)).unwrap();
        assert_eq!(config.race_window_ms, 25);
        assert_eq!(config.race_window(), Duration::from_millis(25));
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let err = MarkingConfig::load(Some(Path::new("/nonexistent/ta-marking.toml")));
        assert!(matches!(err, Err(MarkingError::Io { .. })));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let config = MarkingConfig {
            review_delay_ms: DelayRange::new(10, 5),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("review_delay_ms"));
    }

    #[test]
    fn validate_rejects_bad_probability_and_scale() {
        let config = MarkingConfig {
            correction_probability: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MarkingConfig {
            time_scale: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_overflowing_time_scale() {
        let config = MarkingConfig {
            time_scale: 1e20,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MarkingError::Config(_)));
        assert!(err.to_string().contains("review_delay_ms"));

        let config = MarkingConfig {
            review_delay_ms: DelayRange::new(0, 0),
            mark_delay_ms: DelayRange::new(0, 0),
            race_window_ms: u64::MAX,
            time_scale: 1e6,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("race_window_ms"));
    }

    #[test]
    fn oversized_delays_saturate_instead_of_panicking() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let range = DelayRange::new(1000, 2000);
        assert_eq!(range.sample(&mut rng, 1e20), Duration::MAX);

        let config = MarkingConfig {
            race_window_ms: 5,
            time_scale: f64::MAX,
            ..Default::default()
        };
        assert_eq!(config.race_window(), Duration::MAX);
    }

    #[test]
    fn zero_time_scale_is_valid_and_zeroes_delays() {
        let config = MarkingConfig {
            time_scale: 0.0,
            race_window_ms: 50,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.race_window(), Duration::ZERO);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        assert_eq!(config.mark_delay_ms.sample(&mut rng, 0.0), Duration::ZERO);
    }

    #[test]
    fn sample_stays_in_range_and_scales() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let range = DelayRange::new(100, 200);
        for _ in 0..100 {
            let d = range.sample(&mut rng, 1.0);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
        let fixed = DelayRange::new(40, 40);
        assert_eq!(fixed.sample(&mut rng, 0.5), Duration::from_millis(20));
    }
}
