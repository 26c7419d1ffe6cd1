//! Stand-ins for the hardware collaborators.
//!
//! Used by the unit tests and the demos, and handy for exercising a host
//! application without a board attached.

use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;

use crate::acquisition::AuxOutput;
use crate::sample_source::{Adc, Channel, SAMPLE_MAX};
use crate::tick::TickTimer;
use crate::transport::{ByteTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Ekg,
}

impl Waveform {
    pub const ALL: [Self; 4] = [Self::Sine, Self::Square, Self::Triangle, Self::Ekg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Ekg => "ekg",
        }
    }

    /// Normalised shape in [-1, 1] at `phase` in [0, 1).
    fn shape(&self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
            Waveform::Ekg => {
                // (center, amplitude, width) of the P, Q, R, S and T waves
                const WAVES: [(f64, f64, f64); 5] = [
                    (0.20, 0.15, 0.025),
                    (0.36, -0.15, 0.010),
                    (0.40, 1.00, 0.012),
                    (0.44, -0.25, 0.010),
                    (0.65, 0.30, 0.040),
                ];
                WAVES
                    .iter()
                    .map(|&(center, amplitude, width)| {
                        let x = (phase - center) / width;
                        amplitude * (-0.5 * x * x).exp()
                    })
                    .sum()
            }
        }
    }
}

/// A periodic test signal fed to one ADC input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub waveform: Waveform,
    pub frequency_hz: f64,
    /// Peak deviation from `offset`, in ADC counts.
    pub amplitude: f64,
    pub offset: f64,
}

impl Signal {
    /// Full-swing signal centred on mid-scale.
    pub fn new(waveform: Waveform, frequency_hz: f64) -> Self {
        Self {
            waveform,
            frequency_hz,
            amplitude: 400.0,
            offset: 512.0,
        }
    }

    fn level_at(&self, t: f64) -> u16 {
        let phase = (t * self.frequency_hz).fract();
        let value = self.offset + self.amplitude * self.waveform.shape(phase);
        value.round().clamp(0.0, f64::from(SAMPLE_MAX)) as u16
    }
}

/// ADC that synthesises signals in software, advancing its clock by one
/// sample period per conversion.
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    signals: [Option<Signal>; 4],
    enabled: [bool; 4],
    rate_hz: u32,
    running: bool,
    elapsed_s: f64,
}

impl SimulatedAdc {
    /// Every input idles at mid-scale until given a signal.
    pub fn new() -> Self {
        Self {
            signals: [None; 4],
            enabled: [false; 4],
            rate_hz: 1,
            running: false,
            elapsed_s: 0.0,
        }
    }

    pub fn with_signal(mut self, channel: Channel, signal: Signal) -> Self {
        self.signals[channel.index()] = Some(signal);
        self
    }
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl Adc for SimulatedAdc {
    fn set_sample_rate(&mut self, hz: u32) {
        self.rate_hz = hz.max(1);
    }

    fn enable_channel(&mut self, channel: Channel) {
        self.enabled[channel.index()] = true;
    }

    fn disable_channel(&mut self, channel: Channel) {
        self.enabled[channel.index()] = false;
    }

    fn start_conversions(&mut self) {
        self.running = true;
    }

    fn stop_conversions(&mut self) {
        self.running = false;
    }

    fn conversion_done(&mut self, channel: Channel) -> bool {
        self.running && self.enabled[channel.index()]
    }

    fn read_value(&mut self, channel: Channel) -> u16 {
        let value = self.signals[channel.index()]
            .map_or(512, |signal| signal.level_at(self.elapsed_s));
        self.elapsed_s += 1.0 / f64::from(self.rate_hz);
        value
    }
}

/// ADC that replays a fixed list of readings, then repeats the last one.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdc {
    script: VecDeque<u16>,
    last: u16,
    reads: usize,
    starts: usize,
    rate_hz: u32,
    running: bool,
    enabled: Vec<Channel>,
    stall_after: Option<usize>,
    last_read_channel: Option<Channel>,
}

impl ScriptedAdc {
    pub fn new(samples: impl IntoIterator<Item = u16>) -> Self {
        Self {
            script: samples.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Never reports a finished conversion.
    pub fn stalled(self) -> Self {
        self.stall_after(0)
    }

    /// Stops reporting finished conversions after `reads` reads.
    pub fn stall_after(mut self, reads: usize) -> Self {
        self.stall_after = Some(reads);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Times conversions were started.
    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn programmed_rate(&self) -> u32 {
        self.rate_hz
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn enabled_channels(&self) -> Vec<Channel> {
        self.enabled.clone()
    }

    pub fn last_read_channel(&self) -> Option<Channel> {
        self.last_read_channel
    }
}

impl Adc for ScriptedAdc {
    fn set_sample_rate(&mut self, hz: u32) {
        self.rate_hz = hz;
    }

    fn enable_channel(&mut self, channel: Channel) {
        if !self.enabled.contains(&channel) {
            self.enabled.push(channel);
        }
    }

    fn disable_channel(&mut self, channel: Channel) {
        self.enabled.retain(|&c| c != channel);
    }

    fn start_conversions(&mut self) {
        self.running = true;
        self.starts += 1;
    }

    fn stop_conversions(&mut self) {
        self.running = false;
    }

    fn conversion_done(&mut self, _channel: Channel) -> bool {
        self.stall_after.map_or(true, |limit| self.reads < limit)
    }

    fn read_value(&mut self, channel: Channel) -> u16 {
        self.last_read_channel = Some(channel);
        self.reads += 1;
        if let Some(value) = self.script.pop_front() {
            self.last = value;
        }
        self.last
    }
}

/// In-memory host link: queued input, captured output.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    sent: Vec<u8>,
    pauses: Vec<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let mut transport = Self::new();
        transport.queue_input(bytes);
        transport
    }

    /// Makes `bytes` available to `read_byte`, as if sent by the host.
    pub fn queue_input(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.sent)
    }

    /// Pauses requested so far; none of them actually slept.
    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }
}

impl ByteTransport for MemoryTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        Ok(self.inbound.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sent.extend_from_slice(bytes);
        Ok(())
    }

    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// Tick timer that only remembers the rates it was given.
#[derive(Debug, Clone, Default)]
pub struct RecordingTicker {
    history: Vec<u32>,
}

impl RecordingTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<u32> {
        self.history.last().copied()
    }

    pub fn history(&self) -> &[u32] {
        &self.history
    }
}

impl TickTimer for RecordingTicker {
    fn set_frequency(&mut self, hz: u32) {
        self.history.push(hz);
    }
}

/// Output pin that remembers every level written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    levels: Vec<bool>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.levels.last().copied().unwrap_or(false)
    }

    pub fn levels(&self) -> &[bool] {
        &self.levels
    }
}

impl AuxOutput for RecordingPin {
    fn set_level(&mut self, high: bool) {
        self.levels.push(high);
    }
}
