use crate::config::ConfigError;
use crate::sample_source::{Adc, Sample, SampleSource, SampleSourceError, SAMPLE_MAX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    #[default]
    Free,
    RisingEdge,
    FallingEdge,
}

impl TriggerMode {
    /// Argument letter used by the `T` command.
    pub fn as_char(&self) -> char {
        match self {
            TriggerMode::Free => 'F',
            TriggerMode::RisingEdge => 'P',
            TriggerMode::FallingEdge => 'N',
        }
    }

    pub fn from_arg(arg: u8) -> Option<Self> {
        match arg {
            b'P' => Some(TriggerMode::RisingEdge),
            b'N' => Some(TriggerMode::FallingEdge),
            b'F' => Some(TriggerMode::Free),
            _ => None,
        }
    }
}

/// Threshold compared against consecutive samples, in raw ADC counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerLevel(u16);

impl TriggerLevel {
    pub const CENTER: Self = Self(512);

    pub fn new(raw: u16) -> Result<Self, ConfigError> {
        if raw > SAMPLE_MAX {
            return Err(ConfigError::LevelOutOfRange(raw));
        }
        Ok(Self(raw))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl Default for TriggerLevel {
    fn default() -> Self {
        Self::CENTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Satisfied,
    TimedOut,
}

impl TriggerOutcome {
    pub fn is_satisfied(self) -> bool {
        self == TriggerOutcome::Satisfied
    }
}

/// Polls the sample source for a level crossing.
///
/// The `(prev, curr)` pair lives with the caller, normally the frame
/// buffer's lookback, so it can be inspected after a wait ends.
#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    reads: u32,
}

impl TriggerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads until the edge condition holds or `retry_limit` samples have
    /// gone by, shifting each new sample through `window`.
    ///
    /// Both window slots start at `level`, so the first sample is compared
    /// against a neutral baseline and can never complete an edge on its own.
    /// A rising trigger fires on the sample that comes back to or below the
    /// level after one above it; a falling trigger fires on the sample that
    /// returns to or above the level after one below it.
    pub fn wait<A: Adc>(
        &mut self,
        mode: TriggerMode,
        level: TriggerLevel,
        source: &mut SampleSource<A>,
        retry_limit: u32,
        window: &mut [Sample; 2],
    ) -> Result<TriggerOutcome, SampleSourceError> {
        self.reads = 0;
        let fired: fn(u16, u16, u16) -> bool = match mode {
            TriggerMode::Free => return Ok(TriggerOutcome::Satisfied),
            TriggerMode::RisingEdge => |prev, curr, level| prev > level && curr <= level,
            TriggerMode::FallingEdge => |prev, curr, level| prev < level && curr >= level,
        };

        let level = level.value();
        let baseline = Sample::from_raw(level);
        *window = [baseline, baseline];

        for _ in 0..retry_limit {
            window[0] = window[1];
            window[1] = source.read_one()?;
            self.reads += 1;

            if fired(window[0].value(), window[1].value(), level) {
                return Ok(TriggerOutcome::Satisfied);
            }
        }

        log::debug!(
            "No {:?} crossing of level {} within {} samples",
            mode,
            level,
            retry_limit
        );
        Ok(TriggerOutcome::TimedOut)
    }

    /// Samples consumed by the last wait.
    pub fn reads(&self) -> u32 {
        self.reads
    }
}
