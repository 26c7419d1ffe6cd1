use crate::codec::{encode_burst, encode_sample, Command, SampleMarker, DISCARD};
use crate::config::ScopeConfig;
use crate::frame_buffer::{FrameBuffer, NFRAME};
use crate::sample_source::{Adc, Channel, SampleSource, SampleSourceError};
use crate::tick::TickTimer;
use crate::transport::{ByteTransport, TransportError};
use crate::trigger::{TriggerDetector, TriggerMode, TriggerOutcome};

/// Tick rate in burst mode: one frame every 125 ms.
pub const FRAME_SYNC_HZ: u32 = 8;

/// ADC rate in continuous mode. Only the trigger check runs this fast.
pub const CONTINUOUS_ADC_HZ: u32 = 96_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionMode {
    #[default]
    Burst,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    Stop,
    #[default]
    Run,
    Single,
}

impl RunState {
    pub fn index(self) -> u8 {
        match self {
            RunState::Stop => 0,
            RunState::Run => 1,
            RunState::Single => 2,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(RunState::Stop),
            b'1' => Some(RunState::Run),
            b'2' => Some(RunState::Single),
            _ => None,
        }
    }
}

/// ADC rates selectable in burst mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstRate {
    /// 5 ms/div
    Hz9600,
    /// 1 ms/div
    #[default]
    Hz48000,
    /// 0.5 ms/div
    Hz96000,
    Hz192000,
}

impl BurstRate {
    pub const ALL: [Self; 4] = [Self::Hz9600, Self::Hz48000, Self::Hz96000, Self::Hz192000];

    pub fn sample_rate_hz(self) -> u32 {
        match self {
            BurstRate::Hz9600 => 9_600,
            BurstRate::Hz48000 => 48_000,
            BurstRate::Hz96000 => 96_000,
            BurstRate::Hz192000 => 192_000,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            BurstRate::Hz9600 => 0,
            BurstRate::Hz48000 => 1,
            BurstRate::Hz96000 => 2,
            BurstRate::Hz192000 => 3,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(BurstRate::Hz9600),
            b'1' => Some(BurstRate::Hz48000),
            b'2' => Some(BurstRate::Hz96000),
            b'3' => Some(BurstRate::Hz192000),
            _ => None,
        }
    }
}

/// Tick rates selectable in continuous mode, one sample per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuousRate {
    /// 2 s/div
    Hz24,
    /// 1 s/div
    #[default]
    Hz48,
    /// 0.5 s/div
    Hz96,
    Hz480,
}

impl ContinuousRate {
    pub const ALL: [Self; 4] = [Self::Hz24, Self::Hz48, Self::Hz96, Self::Hz480];

    pub fn tick_hz(self) -> u32 {
        match self {
            ContinuousRate::Hz24 => 24,
            ContinuousRate::Hz48 => 48,
            ContinuousRate::Hz96 => 96,
            ContinuousRate::Hz480 => 480,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            ContinuousRate::Hz24 => 0,
            ContinuousRate::Hz48 => 1,
            ContinuousRate::Hz96 => 2,
            ContinuousRate::Hz480 => 3,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            b'0' => Some(ContinuousRate::Hz24),
            b'1' => Some(ContinuousRate::Hz48),
            b'2' => Some(ContinuousRate::Hz96),
            b'3' => Some(ContinuousRate::Hz480),
            _ => None,
        }
    }
}

/// The auxiliary digital output driven by the `G` command.
pub trait AuxOutput {
    fn set_level(&mut self, high: bool);
}

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Sample source error: {0}")]
    Source(#[from] SampleSourceError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A whole burst frame went out.
    FrameSent { samples: usize },
    /// One continuous-mode sample went out.
    SampleSent { terminal: bool },
    /// Acquired while stopped, nothing sent.
    Held,
    /// Burst trigger never fired; the captured frame was dropped.
    TriggerTimedOut,
}

/// Point-in-time view of the configuration, for logging and hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStatus {
    pub mode: AcquisitionMode,
    pub run_state: RunState,
    pub trigger_mode: TriggerMode,
    pub channel: Channel,
    pub adc_rate_hz: u32,
    pub tick_hz: u32,
    pub burst_length: usize,
    pub frame_count: usize,
    pub aux_high: bool,
}

/// Owns the acquisition pipeline and the settings the host controls.
///
/// Commands go through [`apply`](Self::apply) between ticks; each tick
/// runs one acquisition cycle through [`on_tick`](Self::on_tick). Neither
/// is ever interrupted by the other.
pub struct AcquisitionStateMachine<A, K, G, const N: usize = NFRAME> {
    config: ScopeConfig,
    source: SampleSource<A>,
    detector: TriggerDetector,
    frame: FrameBuffer<N>,
    ticker: K,
    aux: G,
    mode: AcquisitionMode,
    run_state: RunState,
    trigger_mode: TriggerMode,
    burst_rate: BurstRate,
    continuous_rate: ContinuousRate,
    burst_length: usize,
    frame_count: usize,
    tick_hz: u32,
    aux_high: bool,
    pending_channel: Option<Channel>,
}

impl<A, K, G, const N: usize> AcquisitionStateMachine<A, K, G, N>
where
    A: Adc,
    K: TickTimer,
    G: AuxOutput,
{
    /// Boots into burst mode at 48 kHz, running, free trigger, channel 0,
    /// aux output low. Nothing is sent to the host.
    pub fn new(adc: A, ticker: K, mut aux: G, config: ScopeConfig) -> Self {
        let burst_rate = BurstRate::default();
        let source = SampleSource::new(
            adc,
            burst_rate.sample_rate_hz(),
            Channel::default(),
            config.stall_policy,
        );
        aux.set_level(false);

        let mut machine = Self {
            config,
            source,
            detector: TriggerDetector::new(),
            frame: FrameBuffer::new(),
            ticker,
            aux,
            mode: AcquisitionMode::Burst,
            run_state: RunState::Run,
            trigger_mode: TriggerMode::Free,
            burst_rate,
            continuous_rate: ContinuousRate::default(),
            burst_length: N,
            frame_count: 0,
            tick_hz: FRAME_SYNC_HZ,
            aux_high: false,
            pending_channel: None,
        };
        machine.enter_burst(burst_rate);
        machine
    }

    /// Applies one host command. Only mode switches and `Single` write to
    /// the transport (the discard marker).
    pub fn apply<T: ByteTransport>(
        &mut self,
        command: Command,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        log::debug!("Applying {:?}", command);
        match command {
            Command::Burst(rate) => self.set_burst_mode(rate, transport),
            Command::Continuous(rate) => self.set_continuous_mode(rate, transport),
            Command::Run(state) => self.set_run_state(state, transport),
            Command::Trigger(mode) => {
                self.set_trigger_mode(mode);
                Ok(())
            }
            Command::Aux(high) => {
                self.set_aux_output(high);
                Ok(())
            }
            Command::Input(channel) => {
                self.set_channel(channel);
                Ok(())
            }
        }
    }

    pub fn set_burst_mode<T: ByteTransport>(
        &mut self,
        rate: BurstRate,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        self.enter_burst(rate);
        transport.write_all(&[DISCARD])
    }

    pub fn set_continuous_mode<T: ByteTransport>(
        &mut self,
        rate: ContinuousRate,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        self.mode = AcquisitionMode::Continuous;
        self.continuous_rate = rate;
        self.burst_length = 1;
        self.frame_count = 0;
        self.source.set_rate(CONTINUOUS_ADC_HZ);
        self.set_tick_rate(rate.tick_hz());
        transport.write_all(&[DISCARD])
    }

    pub fn set_run_state<T: ByteTransport>(
        &mut self,
        state: RunState,
        transport: &mut T,
    ) -> Result<(), TransportError> {
        self.run_state = state;
        match state {
            RunState::Stop => Ok(()),
            RunState::Run => {
                self.frame_count = 0;
                Ok(())
            }
            RunState::Single => {
                self.frame_count = 0;
                transport.write_all(&[DISCARD])
            }
        }
    }

    pub fn set_trigger_mode(&mut self, mode: TriggerMode) {
        self.trigger_mode = mode;
    }

    pub fn set_aux_output(&mut self, high: bool) {
        self.aux.set_level(high);
        self.aux_high = high;
    }

    /// Switches input now, or at the next frame boundary if a frame is
    /// being acquired.
    pub fn set_channel(&mut self, channel: Channel) {
        match self.source.select_channel(channel) {
            Ok(()) => self.pending_channel = None,
            Err(e) => {
                log::debug!("{}; switching at the next frame", e);
                self.pending_channel = Some(channel);
            }
        }
    }

    /// Runs one acquisition cycle for the current mode.
    pub fn on_tick<T: ByteTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<CycleOutcome, AcquisitionError> {
        if let Some(channel) = self.pending_channel.take() {
            self.set_channel(channel);
        }
        match self.mode {
            AcquisitionMode::Burst => self.burst_cycle(transport),
            AcquisitionMode::Continuous => self.continuous_cycle(transport),
        }
    }

    fn enter_burst(&mut self, rate: BurstRate) {
        self.mode = AcquisitionMode::Burst;
        self.burst_rate = rate;
        self.burst_length = N;
        self.frame_count = 0;
        self.source.set_rate(rate.sample_rate_hz());
        self.set_tick_rate(FRAME_SYNC_HZ);
    }

    fn set_tick_rate(&mut self, hz: u32) {
        self.tick_hz = hz;
        self.ticker.set_frequency(hz);
    }

    fn wait_trigger(&mut self) -> Result<TriggerOutcome, SampleSourceError> {
        self.detector.wait(
            self.trigger_mode,
            self.config.trigger_level,
            &mut self.source,
            self.config.trigger_retry_limit,
            self.frame.lookback_mut(),
        )
    }

    fn capture_burst(&mut self) -> Result<TriggerOutcome, SampleSourceError> {
        let outcome = self.wait_trigger()?;
        self.frame.fill_burst(&mut self.source, self.burst_length)?;
        Ok(outcome)
    }

    fn burst_cycle<T: ByteTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<CycleOutcome, AcquisitionError> {
        let _span = tracing::trace_span!("burst_cycle").entered();
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::span!("burst_cycle");

        self.source.begin_frame();
        let captured = self.capture_burst();
        self.source.end_frame();

        if captured? == TriggerOutcome::TimedOut {
            log::debug!("Trigger timed out, frame dropped");
            return Ok(CycleOutcome::TriggerTimedOut);
        }

        let outcome = if self.run_state == RunState::Stop {
            CycleOutcome::Held
        } else {
            self.send_burst(transport)?;
            CycleOutcome::FrameSent {
                samples: self.frame.len(),
            }
        };
        if self.run_state == RunState::Single {
            log::info!("Single frame sent, stopping");
            self.run_state = RunState::Stop;
        }
        Ok(outcome)
    }

    fn send_burst<T: ByteTransport>(&self, transport: &mut T) -> Result<(), TransportError> {
        let len = self.frame.len();
        for (i, pair) in encode_burst(self.frame.as_slice()).enumerate() {
            transport.write_all(&pair)?;
            if let Some(pacing) = self.config.burst_pacing {
                if pacing.pause_after(i, len) {
                    transport.pause(pacing.pause());
                }
            }
        }
        Ok(())
    }

    fn continuous_cycle<T: ByteTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<CycleOutcome, AcquisitionError> {
        let _span = tracing::trace_span!("continuous_cycle", frame_count = self.frame_count).entered();
        #[cfg(feature = "cpu-profiling")]
        let _zone = tracy_client::span!("continuous_cycle");

        if self.frame_count == 0 {
            // Re-aligns the phase of the new frame; the outcome does not gate sending.
            self.source.begin_frame();
            let synced = self.wait_trigger();
            self.source.end_frame();
            if !synced?.is_satisfied() {
                log::trace!("Frame start trigger timed out, sending anyway");
            }
        }

        let sample = self.frame.advance_one(&mut self.source)?;
        if self.run_state == RunState::Stop {
            return Ok(CycleOutcome::Held);
        }

        if self.frame_count >= N {
            transport.write_all(&encode_sample(sample, SampleMarker::ContinuousEnd))?;
            self.frame_count = 0;
            if self.run_state == RunState::Single {
                log::info!("Single frame sent, stopping");
                self.run_state = RunState::Stop;
            }
            Ok(CycleOutcome::SampleSent { terminal: true })
        } else {
            transport.write_all(&encode_sample(sample, SampleMarker::ContinuousLow))?;
            self.frame_count += 1;
            Ok(CycleOutcome::SampleSent { terminal: false })
        }
    }

    pub fn status(&self) -> ScopeStatus {
        ScopeStatus {
            mode: self.mode,
            run_state: self.run_state,
            trigger_mode: self.trigger_mode,
            channel: self.source.channel(),
            adc_rate_hz: self.source.rate_hz(),
            tick_hz: self.tick_hz,
            burst_length: self.burst_length,
            frame_count: self.frame_count,
            aux_high: self.aux_high,
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.trigger_mode
    }

    pub fn channel(&self) -> Channel {
        self.source.channel()
    }

    /// Channel waiting for the current frame to finish.
    pub fn pending_channel(&self) -> Option<Channel> {
        self.pending_channel
    }

    pub fn burst_rate(&self) -> BurstRate {
        self.burst_rate
    }

    pub fn continuous_rate(&self) -> ContinuousRate {
        self.continuous_rate
    }

    pub fn burst_length(&self) -> usize {
        self.burst_length
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn tick_hz(&self) -> u32 {
        self.tick_hz
    }

    pub fn frame(&self) -> &FrameBuffer<N> {
        &self.frame
    }

    pub fn source(&self) -> &SampleSource<A> {
        &self.source
    }

    pub fn ticker(&self) -> &K {
        &self.ticker
    }

    pub fn aux(&self) -> &G {
        &self.aux
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{StreamDecoder, StreamEvent};
    use crate::sample_source::Sample;
    use crate::sim::{MemoryTransport, RecordingPin, RecordingTicker, ScriptedAdc};
    use std::time::Duration;

    type Machine<const N: usize> = AcquisitionStateMachine<ScriptedAdc, RecordingTicker, RecordingPin, N>;

    fn machine<const N: usize>(samples: impl IntoIterator<Item = u16>) -> Machine<N> {
        AcquisitionStateMachine::new(
            ScriptedAdc::new(samples),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_burst_pacing(None),
        )
    }

    fn samples_of(events: &[StreamEvent]) -> Vec<(u16, SampleMarker)> {
        events
            .iter()
            .filter_map(|event| match event {
                StreamEvent::Sample { sample, marker } => Some((sample.value(), *marker)),
                StreamEvent::Discard => None,
            })
            .collect()
    }

    #[test]
    fn test_boot_defaults() {
        let scope: Machine<NFRAME> = machine([]);
        let status = scope.status();

        assert_eq!(status.mode, AcquisitionMode::Burst);
        assert_eq!(status.run_state, RunState::Run);
        assert_eq!(status.trigger_mode, TriggerMode::Free);
        assert_eq!(status.channel, Channel::Adc0);
        assert_eq!(status.adc_rate_hz, 48_000);
        assert_eq!(status.tick_hz, FRAME_SYNC_HZ);
        assert_eq!(status.burst_length, NFRAME);
        assert_eq!(status.frame_count, 0);
        assert!(!status.aux_high);
        assert_eq!(scope.ticker().current(), Some(FRAME_SYNC_HZ));
        assert_eq!(scope.aux().levels(), &[false]);
        assert_eq!(scope.config().trigger_retry_limit, ScopeConfig::DEFAULT_RETRY_LIMIT);
    }

    #[test]
    fn test_mode_switches_reset_frame_bookkeeping() {
        let mut scope: Machine<NFRAME> = machine([]);
        let mut link = MemoryTransport::new();

        for rate in BurstRate::ALL {
            scope.frame_count = 17;
            scope.apply(Command::Burst(rate), &mut link).unwrap();
            assert_eq!(scope.mode(), AcquisitionMode::Burst);
            assert_eq!(scope.frame_count(), 0);
            assert_eq!(scope.burst_length(), NFRAME);
            assert_eq!(scope.source().rate_hz(), rate.sample_rate_hz());
            assert_eq!(scope.tick_hz(), FRAME_SYNC_HZ);
            assert_eq!(link.take_sent(), vec![DISCARD]);
        }

        for rate in ContinuousRate::ALL {
            scope.frame_count = 17;
            scope.apply(Command::Continuous(rate), &mut link).unwrap();
            assert_eq!(scope.mode(), AcquisitionMode::Continuous);
            assert_eq!(scope.frame_count(), 0);
            assert_eq!(scope.burst_length(), 1);
            assert_eq!(scope.source().rate_hz(), CONTINUOUS_ADC_HZ);
            assert_eq!(scope.tick_hz(), rate.tick_hz());
            assert_eq!(scope.ticker().current(), Some(rate.tick_hz()));
            assert_eq!(link.take_sent(), vec![DISCARD]);
        }

        assert_eq!(
            scope.ticker().history(),
            &[8, 8, 8, 8, 8, 24, 48, 96, 480]
        );
    }

    #[test]
    fn test_single_burst_sends_one_frame_then_stops() {
        let mut scope: Machine<NFRAME> = machine((0..2 * NFRAME as u16).map(|i| i % 1024));
        let mut link = MemoryTransport::new();

        scope.apply(Command::Burst(BurstRate::Hz48000), &mut link).unwrap();
        scope.apply(Command::Run(RunState::Single), &mut link).unwrap();
        assert_eq!(link.sent(), &[DISCARD, DISCARD]);

        let outcome = scope.on_tick(&mut link).unwrap();
        assert_eq!(outcome, CycleOutcome::FrameSent { samples: NFRAME });
        assert_eq!(scope.run_state(), RunState::Stop);

        let events = StreamDecoder::new().decode_all(link.sent());
        let samples = samples_of(&events);
        assert_eq!(samples.len(), NFRAME);
        assert!(samples[..NFRAME - 1]
            .iter()
            .all(|(_, marker)| *marker == SampleMarker::BurstLow));
        assert_eq!(samples[NFRAME - 1].1, SampleMarker::BurstEnd);
        assert_eq!(samples[10].0, 10);

        link.take_sent();
        assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::Held);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_single_discard_precedes_frame() {
        let mut scope: Machine<8> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Run(RunState::Single), &mut link).unwrap();
        assert_eq!(link.sent(), &[DISCARD]);

        scope.on_tick(&mut link).unwrap();
        assert_eq!(link.sent()[0], DISCARD);
        assert_eq!(link.sent().len(), 1 + 2 * 8);
    }

    #[test]
    fn test_burst_timeout_drops_frame_and_keeps_single() {
        // Flat signal: no rising edge ever.
        let mut scope: Machine<8> = AcquisitionStateMachine::new(
            ScriptedAdc::new([300]),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_retry_limit(20),
        );
        let mut link = MemoryTransport::new();

        scope.apply(Command::Trigger(TriggerMode::RisingEdge), &mut link).unwrap();
        scope.apply(Command::Run(RunState::Single), &mut link).unwrap();
        link.take_sent();

        assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::TriggerTimedOut);
        assert!(link.sent().is_empty());
        assert_eq!(scope.run_state(), RunState::Single);
        // The frame is still read after the trigger gives up.
        assert_eq!(scope.source().adc().reads(), 20 + 8);
        assert!(!scope.source().is_acquiring());
    }

    #[test]
    fn test_burst_waits_for_rising_trigger() {
        let mut script = vec![600, 600, 400];
        script.extend(100..108);
        let mut scope: Machine<8> = machine(script);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Trigger(TriggerMode::RisingEdge), &mut link).unwrap();
        assert_eq!(
            scope.on_tick(&mut link).unwrap(),
            CycleOutcome::FrameSent { samples: 8 }
        );

        let values: Vec<u16> = samples_of(&StreamDecoder::new().decode_all(link.sent()))
            .into_iter()
            .map(|(value, _)| value)
            .collect();
        assert_eq!(values, (100..108).collect::<Vec<u16>>());
    }

    #[test]
    fn test_stopped_burst_still_acquires() {
        let mut scope: Machine<8> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Run(RunState::Stop), &mut link).unwrap();
        assert!(link.sent().is_empty());

        assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::Held);
        assert!(link.sent().is_empty());
        assert_eq!(scope.source().adc().reads(), 8);
        assert_eq!(scope.frame().len(), 8);
    }

    #[test]
    fn test_stopped_burst_still_waits_for_trigger() {
        let mut scope: Machine<8> = AcquisitionStateMachine::new(
            ScriptedAdc::new([300]),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_retry_limit(10),
        );
        let mut link = MemoryTransport::new();

        scope.apply(Command::Trigger(TriggerMode::RisingEdge), &mut link).unwrap();
        scope.apply(Command::Run(RunState::Stop), &mut link).unwrap();

        assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::TriggerTimedOut);
        assert_eq!(scope.source().adc().reads(), 10 + 8);
        assert!(link.sent().is_empty());
        assert_eq!(
            scope.frame().lookback(),
            (Sample::from_raw(300), Sample::from_raw(300))
        );
    }

    #[test]
    fn test_stopped_continuous_still_waits_for_trigger() {
        let mut scope: Machine<4> = AcquisitionStateMachine::new(
            ScriptedAdc::new([300]),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_retry_limit(10),
        );
        let mut link = MemoryTransport::new();

        scope.apply(Command::Continuous(ContinuousRate::Hz48), &mut link).unwrap();
        scope.apply(Command::Trigger(TriggerMode::RisingEdge), &mut link).unwrap();
        scope.apply(Command::Run(RunState::Stop), &mut link).unwrap();
        link.take_sent();

        for tick in 1..=3 {
            assert_eq!(scope.frame_count(), 0);
            assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::Held);
            assert_eq!(scope.source().adc().reads(), tick * (10 + 1));
        }
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_burst_pacing_pauses() {
        let mut scope: Machine<NFRAME> = AcquisitionStateMachine::new(
            ScriptedAdc::new([512]),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default(),
        );
        let mut link = MemoryTransport::new();

        scope.on_tick(&mut link).unwrap();

        assert_eq!(link.sent().len(), 2 * NFRAME);
        assert_eq!(link.pauses(), &[Duration::from_millis(1); 8]);
    }

    #[test]
    fn test_continuous_frame_has_terminal_marker() {
        let mut scope: Machine<4> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Continuous(ContinuousRate::Hz48), &mut link).unwrap();
        link.take_sent();

        let outcomes: Vec<CycleOutcome> = (0..6).map(|_| scope.on_tick(&mut link).unwrap()).collect();

        assert_eq!(
            outcomes,
            vec![
                CycleOutcome::SampleSent { terminal: false },
                CycleOutcome::SampleSent { terminal: false },
                CycleOutcome::SampleSent { terminal: false },
                CycleOutcome::SampleSent { terminal: false },
                CycleOutcome::SampleSent { terminal: true },
                CycleOutcome::SampleSent { terminal: false },
            ]
        );
        assert_eq!(scope.frame_count(), 1);

        let samples = samples_of(&StreamDecoder::new().decode_all(link.sent()));
        let markers: Vec<SampleMarker> = samples.iter().map(|(_, m)| *m).collect();
        assert_eq!(markers[4], SampleMarker::ContinuousEnd);
        assert!(markers
            .iter()
            .enumerate()
            .all(|(i, m)| (i == 4) == (*m == SampleMarker::ContinuousEnd)));
    }

    #[test]
    fn test_continuous_single_stops_after_terminal_sample() {
        let mut scope: Machine<3> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Continuous(ContinuousRate::Hz24), &mut link).unwrap();
        scope.apply(Command::Run(RunState::Single), &mut link).unwrap();
        assert_eq!(link.take_sent(), vec![DISCARD, DISCARD]);

        for _ in 0..3 {
            scope.on_tick(&mut link).unwrap();
            assert_eq!(scope.run_state(), RunState::Single);
        }
        assert_eq!(
            scope.on_tick(&mut link).unwrap(),
            CycleOutcome::SampleSent { terminal: true }
        );
        assert_eq!(scope.run_state(), RunState::Stop);
        assert_eq!(scope.on_tick(&mut link).unwrap(), CycleOutcome::Held);
        assert_eq!(link.sent().len(), 2 * 4);
    }

    #[test]
    fn test_continuous_trigger_only_at_frame_start() {
        let mut scope: Machine<4> = AcquisitionStateMachine::new(
            ScriptedAdc::new([300]),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_retry_limit(10),
        );
        let mut link = MemoryTransport::new();

        scope.apply(Command::Continuous(ContinuousRate::Hz96), &mut link).unwrap();
        scope.apply(Command::Trigger(TriggerMode::FallingEdge), &mut link).unwrap();

        // Timed-out wait plus the sample itself.
        assert_eq!(
            scope.on_tick(&mut link).unwrap(),
            CycleOutcome::SampleSent { terminal: false }
        );
        assert_eq!(scope.source().adc().reads(), 11);

        scope.on_tick(&mut link).unwrap();
        assert_eq!(scope.source().adc().reads(), 12);
    }

    #[test]
    fn test_run_resets_frame_count() {
        let mut scope: Machine<4> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Continuous(ContinuousRate::Hz48), &mut link).unwrap();
        scope.on_tick(&mut link).unwrap();
        scope.on_tick(&mut link).unwrap();
        assert_eq!(scope.frame_count(), 2);

        link.take_sent();
        scope.apply(Command::Run(RunState::Stop), &mut link).unwrap();
        assert_eq!(scope.frame_count(), 2);
        scope.apply(Command::Run(RunState::Run), &mut link).unwrap();
        assert_eq!(scope.frame_count(), 0);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_field_commands_apply_immediately() {
        let mut scope: Machine<8> = machine([]);
        let mut link = MemoryTransport::new();

        scope.apply(Command::Trigger(TriggerMode::FallingEdge), &mut link).unwrap();
        scope.apply(Command::Aux(true), &mut link).unwrap();
        scope.apply(Command::Input(Channel::Adc2), &mut link).unwrap();

        assert_eq!(scope.trigger_mode(), TriggerMode::FallingEdge);
        assert!(scope.status().aux_high);
        assert!(scope.aux().is_high());
        assert_eq!(scope.channel(), Channel::Adc2);
        assert!(link.sent().is_empty());
    }

    #[test]
    fn test_channel_change_waits_for_frame_boundary() {
        let mut scope: Machine<8> = machine(0..64);
        let mut link = MemoryTransport::new();

        scope.source.begin_frame();
        scope.apply(Command::Input(Channel::Adc3), &mut link).unwrap();
        assert_eq!(scope.channel(), Channel::Adc0);
        assert_eq!(scope.pending_channel(), Some(Channel::Adc3));
        scope.source.end_frame();

        scope.on_tick(&mut link).unwrap();
        assert_eq!(scope.channel(), Channel::Adc3);
        assert_eq!(scope.pending_channel(), None);
        assert_eq!(scope.source().adc().last_read_channel(), Some(Channel::Adc3));
    }
}
