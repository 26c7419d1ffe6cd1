use crate::sample_source::{Adc, Sample, SampleSource, SampleSourceError};

/// Samples per frame in the reference configuration.
pub const NFRAME: usize = 480;

/// Fixed-capacity frame storage, reused every acquisition cycle.
#[derive(Debug, Clone)]
pub struct FrameBuffer<const N: usize = NFRAME> {
    samples: [Sample; N],
    len: usize,
    lookback: [Sample; 2],
}

impl<const N: usize> FrameBuffer<N> {
    pub fn new() -> Self {
        Self {
            samples: [Sample::MIN; N],
            len: 0,
            lookback: [Sample::MIN; 2],
        }
    }

    /// Reads `length` consecutive samples, replacing the previous frame.
    /// Lengths above the capacity are capped to it.
    pub fn fill_burst<A: Adc>(
        &mut self,
        source: &mut SampleSource<A>,
        length: usize,
    ) -> Result<&[Sample], SampleSourceError> {
        let length = length.min(N);
        self.len = 0;
        for slot in &mut self.samples[..length] {
            *slot = source.read_one()?;
            self.len += 1;
        }
        Ok(&self.samples[..self.len])
    }

    /// Continuous mode: one conversion, kept only in the two-sample lookback
    /// shared with the trigger.
    pub fn advance_one<A: Adc>(
        &mut self,
        source: &mut SampleSource<A>,
    ) -> Result<Sample, SampleSourceError> {
        let sample = source.read_single()?;
        self.lookback = [self.lookback[1], sample];
        Ok(sample)
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        N
    }

    /// Last two samples seen by a trigger wait or
    /// [`advance_one`](Self::advance_one), oldest first.
    pub fn lookback(&self) -> (Sample, Sample) {
        (self.lookback[0], self.lookback[1])
    }

    /// The window a [`TriggerDetector`](crate::TriggerDetector) shifts samples through.
    pub fn lookback_mut(&mut self) -> &mut [Sample; 2] {
        &mut self.lookback
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
