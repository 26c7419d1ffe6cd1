use std::fmt;

/// Largest value a 10-bit conversion can produce.
pub const SAMPLE_MAX: u16 = 0x3ff;

/// One quantized ADC reading, 10 significant bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sample(u16);

impl Sample {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(SAMPLE_MAX);

    /// Keeps the low 10 bits of a raw data-register value.
    pub fn from_raw(raw: u16) -> Self {
        Self(raw & SAMPLE_MAX)
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl From<Sample> for u16 {
    fn from(sample: Sample) -> Self {
        sample.0
    }
}

/// Selectable ADC input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    #[default]
    Adc0,
    Adc1,
    Adc2,
    Adc3,
}

impl Channel {
    pub const ALL: [Self; 4] = [Self::Adc0, Self::Adc1, Self::Adc2, Self::Adc3];

    pub fn index(self) -> usize {
        match self {
            Self::Adc0 => 0,
            Self::Adc1 => 1,
            Self::Adc2 => 2,
            Self::Adc3 => 3,
        }
    }

    /// Maps an ASCII digit `'0'..='3'` to a channel.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(Self::Adc0),
            b'1' => Some(Self::Adc1),
            b'2' => Some(Self::Adc2),
            b'3' => Some(Self::Adc3),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ADC{}", self.index())
    }
}

/// The converter hardware, seen as a set of register-level capabilities.
///
/// Implementations only touch the peripheral; sequencing (which channel,
/// when to start, how long to wait) belongs to [`SampleSource`].
pub trait Adc {
    fn set_sample_rate(&mut self, hz: u32);
    fn enable_channel(&mut self, channel: Channel);
    fn disable_channel(&mut self, channel: Channel);
    /// Starts free-running conversions at the programmed rate.
    fn start_conversions(&mut self);
    fn stop_conversions(&mut self);
    /// Done flag of the channel's data register.
    fn conversion_done(&mut self, channel: Channel) -> bool;
    /// Reads the channel's data register. Clears the done flag.
    fn read_value(&mut self, channel: Channel) -> u16;
}

/// How long [`SampleSource::read_one`] may poll for a finished conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallPolicy {
    /// Poll until the hardware answers, however long that takes.
    #[default]
    Block,
    /// Give up after this many polls and report a stall.
    SpinLimit(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum SampleSourceError {
    #[error("{channel} did not finish a conversion within {spins} polls")]
    Stalled { channel: Channel, spins: u32 },

    #[error("Cannot switch to {requested} while a frame is being acquired on {active}")]
    ChannelBusy { requested: Channel, active: Channel },
}

/// Hands out samples from the active channel at the configured rate.
pub struct SampleSource<A> {
    adc: A,
    rate_hz: u32,
    channel: Channel,
    stall_policy: StallPolicy,
    in_frame: bool,
}

impl<A: Adc> SampleSource<A> {
    pub fn new(mut adc: A, rate_hz: u32, channel: Channel, stall_policy: StallPolicy) -> Self {
        adc.set_sample_rate(rate_hz);
        adc.enable_channel(channel);
        Self {
            adc,
            rate_hz,
            channel,
            stall_policy,
            in_frame: false,
        }
    }

    /// Sets rate and channel. The rate is programmed at the start of the
    /// next acquisition.
    pub fn configure(&mut self, rate_hz: u32, channel: Channel) -> Result<(), SampleSourceError> {
        self.select_channel(channel)?;
        self.set_rate(rate_hz);
        Ok(())
    }

    pub fn set_rate(&mut self, rate_hz: u32) {
        self.rate_hz = rate_hz;
    }

    /// Moves the converter to another input. Refused while a frame is in
    /// flight.
    pub fn select_channel(&mut self, channel: Channel) -> Result<(), SampleSourceError> {
        if self.in_frame {
            return Err(SampleSourceError::ChannelBusy {
                requested: channel,
                active: self.channel,
            });
        }
        self.adc.disable_channel(self.channel);
        self.adc.enable_channel(channel);
        if channel != self.channel {
            log::debug!("ADC input switched from {} to {}", self.channel, channel);
        }
        self.channel = channel;
        Ok(())
    }

    /// Programs the rate and starts free-running conversions for a frame.
    pub fn begin_frame(&mut self) {
        self.adc.set_sample_rate(self.rate_hz);
        self.adc.start_conversions();
        self.in_frame = true;
    }

    pub fn end_frame(&mut self) {
        self.adc.stop_conversions();
        self.in_frame = false;
    }

    /// Waits for the next conversion on the active channel.
    pub fn read_one(&mut self) -> Result<Sample, SampleSourceError> {
        match self.stall_policy {
            StallPolicy::Block => {
                while !self.adc.conversion_done(self.channel) {
                    std::hint::spin_loop();
                }
            }
            StallPolicy::SpinLimit(limit) => {
                let mut spins = 0;
                while !self.adc.conversion_done(self.channel) {
                    spins += 1;
                    if spins >= limit {
                        return Err(SampleSourceError::Stalled {
                            channel: self.channel,
                            spins,
                        });
                    }
                    std::hint::spin_loop();
                }
            }
        }
        Ok(Sample::from_raw(self.adc.read_value(self.channel)))
    }

    /// One conversion outside of a frame: start, read, stop.
    pub fn read_single(&mut self) -> Result<Sample, SampleSourceError> {
        self.begin_frame();
        let sample = self.read_one();
        self.end_frame();
        sample
    }

    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn is_acquiring(&self) -> bool {
        self.in_frame
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedAdc;

    #[test]
    fn test_sample_keeps_ten_bits() {
        assert_eq!(Sample::from_raw(0xffff).value(), 1023);
        assert_eq!(Sample::from_raw(683).value(), 683);
        assert_eq!(u16::from(Sample::MAX), SAMPLE_MAX);
    }

    #[test]
    fn test_channel_from_digit() {
        assert_eq!(Channel::from_digit(b'2'), Some(Channel::Adc2));
        assert_eq!(Channel::from_digit(b'4'), None);
        assert_eq!(Channel::Adc3.to_string(), "ADC3");
    }

    #[test]
    fn test_read_one_returns_scripted_values_in_order() {
        let adc = ScriptedAdc::new([10, 20, 30]);
        let mut source = SampleSource::new(adc, 48_000, Channel::Adc0, StallPolicy::Block);

        source.begin_frame();
        let values: Vec<u16> = (0..3)
            .map(|_| source.read_one().unwrap().value())
            .collect();
        source.end_frame();

        assert_eq!(values, vec![10, 20, 30]);
        assert_eq!(source.adc().reads(), 3);
    }

    #[test]
    fn test_rate_programmed_on_next_frame() {
        let adc = ScriptedAdc::new([1, 2]);
        let mut source = SampleSource::new(adc, 48_000, Channel::Adc0, StallPolicy::Block);

        source.set_rate(9_600);
        assert_eq!(source.adc().programmed_rate(), 48_000);

        source.begin_frame();
        assert_eq!(source.adc().programmed_rate(), 9_600);
        assert!(source.adc().is_running());
        source.end_frame();
        assert!(!source.adc().is_running());
    }

    #[test]
    fn test_channel_switch_disables_previous_input() {
        let adc = ScriptedAdc::new([]);
        let mut source = SampleSource::new(adc, 48_000, Channel::Adc0, StallPolicy::Block);

        source.configure(96_000, Channel::Adc2).unwrap();

        assert_eq!(source.channel(), Channel::Adc2);
        assert_eq!(source.adc().enabled_channels(), vec![Channel::Adc2]);
    }

    #[test]
    fn test_channel_switch_refused_mid_frame() {
        let adc = ScriptedAdc::new([5]);
        let mut source = SampleSource::new(adc, 48_000, Channel::Adc1, StallPolicy::Block);

        source.begin_frame();
        let err = source.select_channel(Channel::Adc3).unwrap_err();
        assert!(matches!(
            err,
            SampleSourceError::ChannelBusy {
                requested: Channel::Adc3,
                active: Channel::Adc1
            }
        ));
        assert_eq!(source.channel(), Channel::Adc1);

        source.end_frame();
        source.select_channel(Channel::Adc3).unwrap();
        assert_eq!(source.channel(), Channel::Adc3);
    }

    #[test]
    fn test_spin_limit_reports_stall() {
        let adc = ScriptedAdc::new([7]).stalled();
        let mut source = SampleSource::new(adc, 48_000, Channel::Adc0, StallPolicy::SpinLimit(100));

        let err = source.read_single().unwrap_err();
        assert!(matches!(err, SampleSourceError::Stalled { spins: 100, .. }));
        assert!(!source.is_acquiring());
        assert!(!source.adc().is_running());
    }

    #[test]
    fn test_read_single_brackets_conversion() {
        let adc = ScriptedAdc::new([321]);
        let mut source = SampleSource::new(adc, 96_000, Channel::Adc0, StallPolicy::Block);

        assert_eq!(source.read_single().unwrap().value(), 321);
        assert!(!source.is_acquiring());
        assert_eq!(source.adc().starts(), 1);
    }
}
