//! Scenario configuration: how many virtual users run, and for how long

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// When virtual users stop issuing requests. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// Run for a fixed wall-clock duration
    Duration(Duration),
    /// Every virtual user runs `per_vu` iterations, bounded by `max_duration`
    Iterations { per_vu: u64, max_duration: Duration },
}

impl StopCondition {
    /// Upper bound on the length of the run, excluding the graceful stop
    pub fn time_limit(&self) -> Duration {
        match self {
            Self::Duration(d) => *d,
            Self::Iterations { max_duration, .. } => *max_duration,
        }
    }

    pub fn iterations_per_vu(&self) -> Option<u64> {
        match self {
            Self::Duration(_) => None,
            Self::Iterations { per_vu, .. } => Some(*per_vu),
        }
    }
}

/// One step of a staged run: hold `target` virtual users for `duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

impl FromStr for Stage {
    type Err = AppError;

    /// Parses `DURATION:TARGET`, e.g. `30s:20`
    fn from_str(s: &str) -> Result<Self> {
        let (duration, target) = s
            .rsplit_once(':')
            .ok_or_else(|| AppError::config(format!("Stage must look like '30s:20', got '{}'", s)))?;
        let duration = humantime::parse_duration(duration.trim())
            .map_err(|e| AppError::parse(format!("Invalid stage duration '{}': {}", duration.trim(), e)))?;
        let target = target
            .trim()
            .parse::<u32>()
            .map_err(|e| AppError::parse(format!("Invalid stage target '{}': {}", target.trim(), e)))?;
        Ok(Self::new(duration, target))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", humantime::format_duration(self.duration), self.target)
    }
}

/// Immutable scenario description handed to the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioConfig {
    concurrency: u32,
    stop: StopCondition,
    stages: Vec<Stage>,
    pause: Option<Duration>,
    graceful_stop: Duration,
}

impl ScenarioConfig {
    /// `vus` virtual users for a fixed duration
    pub fn constant(vus: u32, duration: Duration) -> Result<Self> {
        Self::build(vus, StopCondition::Duration(duration), Vec::new())
    }

    /// `vus` virtual users that each run `iterations` iterations
    pub fn per_vu_iterations(vus: u32, iterations: u64, max_duration: Duration) -> Result<Self> {
        Self::build(
            vus,
            StopCondition::Iterations { per_vu: iterations, max_duration },
            Vec::new(),
        )
    }

    /// Step through `stages`; concurrency is the largest stage target
    pub fn ramping(stages: Vec<Stage>) -> Result<Self> {
        let peak = stages.iter().map(|s| s.target).max().unwrap_or(0);
        let total = stages.iter().map(|s| s.duration).sum();
        Self::build(peak, StopCondition::Duration(total), stages)
    }

    fn build(concurrency: u32, stop: StopCondition, stages: Vec<Stage>) -> Result<Self> {
        let config = Self {
            concurrency,
            stop,
            stages,
            pause: None,
            graceful_stop: crate::defaults::DEFAULT_GRACEFUL_STOP,
        };
        config.validate()?;
        Ok(config)
    }

    /// Pause between iterations of each virtual user. A zero pause disables it.
    pub fn with_pause(mut self, pause: Option<Duration>) -> Self {
        self.pause = pause.filter(|p| !p.is_zero());
        self
    }

    /// Time in-flight requests get to finish once the run ends
    pub fn with_graceful_stop(mut self, graceful_stop: Duration) -> Self {
        self.graceful_stop = graceful_stop;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(AppError::config("Number of virtual users must be greater than 0"));
        }

        match self.stop {
            StopCondition::Duration(d) if d.is_zero() => {
                return Err(AppError::config("Duration must be greater than 0"));
            }
            StopCondition::Iterations { per_vu: 0, .. } => {
                return Err(AppError::config("Iterations per virtual user must be greater than 0"));
            }
            StopCondition::Iterations { max_duration, .. } if max_duration.is_zero() => {
                return Err(AppError::config("Maximum duration must be greater than 0"));
            }
            _ => {}
        }

        if !self.stages.is_empty() {
            if self.stop.iterations_per_vu().is_some() {
                return Err(AppError::config("Stages cannot be combined with iterations"));
            }
            if let Some(stage) = self.stages.iter().find(|s| s.duration.is_zero()) {
                return Err(AppError::config(format!("Stage '{}' must have a non-zero duration", stage)));
            }
        }

        Ok(())
    }

    /// Maximum number of simultaneously live virtual users
    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    pub fn stop(&self) -> StopCondition {
        self.stop
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn pause(&self) -> Option<Duration> {
        self.pause
    }

    pub fn graceful_stop(&self) -> Duration {
        self.graceful_stop
    }

    pub fn is_staged(&self) -> bool {
        !self.stages.is_empty()
    }

    /// Target number of live virtual users `elapsed` into the run
    pub fn target_at(&self, elapsed: Duration) -> u32 {
        if self.stages.is_empty() {
            return self.concurrency;
        }

        let mut offset = Duration::ZERO;
        for stage in &self.stages {
            offset += stage.duration;
            if elapsed < offset {
                return stage.target;
            }
        }
        self.stages.last().map(|s| s.target).unwrap_or(0)
    }

    /// Offset of the next stage boundary strictly after `elapsed`
    pub fn next_stage_change(&self, elapsed: Duration) -> Option<Duration> {
        let mut offset = Duration::ZERO;
        // The last boundary is the end of the run, which is not a target change.
        for stage in self.stages.iter().take(self.stages.len().saturating_sub(1)) {
            offset += stage.duration;
            if offset > elapsed {
                return Some(offset);
            }
        }
        None
    }
}

/// Serde helpers for humantime duration strings
pub(crate) mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S: Serializer>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
            match duration {
                Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
