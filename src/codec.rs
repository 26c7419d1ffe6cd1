//! Wire format between the front end and the host.
//!
//! Outbound, every sample travels as two bytes carrying five payload bits
//! each. The three high bits of a byte are flags: the first byte of a pair
//! always has `000`, the second byte says which kind of frame the sample
//! belongs to and whether it closes it. A lone `0xc0` tells the host to drop
//! whatever partial frame it holds.
//!
//! Inbound, the host sends one ASCII command per `\n`-terminated line: a
//! letter and a single argument character. Anything that does not parse is
//! ignored without a reply, so newer hosts can talk to older firmware.

use crate::acquisition::{BurstRate, ContinuousRate, RunState};
use crate::sample_source::{Channel, Sample};
use crate::trigger::TriggerMode;

/// Control byte: host must discard any partially received frame.
pub const DISCARD: u8 = 0xc0;

/// Longest command line, terminator included.
pub const CMD_LEN: usize = 16;

const PAYLOAD_MASK: u8 = 0x1f;
const FLAG_MASK: u8 = 0xe0;

/// Flags carried by the second byte of a sample pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMarker {
    BurstLow,
    BurstEnd,
    ContinuousLow,
    ContinuousEnd,
}

impl SampleMarker {
    pub fn flag_bits(self) -> u8 {
        match self {
            SampleMarker::BurstLow => 0x20,
            SampleMarker::BurstEnd => 0x40,
            SampleMarker::ContinuousLow => 0x60,
            SampleMarker::ContinuousEnd => 0xa0,
        }
    }

    pub fn from_flag_bits(bits: u8) -> Option<Self> {
        match bits & FLAG_MASK {
            0x20 => Some(SampleMarker::BurstLow),
            0x40 => Some(SampleMarker::BurstEnd),
            0x60 => Some(SampleMarker::ContinuousLow),
            0xa0 => Some(SampleMarker::ContinuousEnd),
            _ => None,
        }
    }

    /// Whether the sample closes its frame.
    pub fn is_end(self) -> bool {
        matches!(self, SampleMarker::BurstEnd | SampleMarker::ContinuousEnd)
    }
}

/// Splits a sample into its high and low wire bytes.
pub fn encode_sample(sample: Sample, marker: SampleMarker) -> [u8; 2] {
    let value = sample.value();
    let high = ((value >> 5) as u8) & PAYLOAD_MASK;
    let low = ((value as u8) & PAYLOAD_MASK) | marker.flag_bits();
    [high, low]
}

/// Inverse of [`encode_sample`]. `None` if either byte carries the wrong
/// flags.
pub fn decode_pair(high: u8, low: u8) -> Option<(Sample, SampleMarker)> {
    if high & FLAG_MASK != 0 {
        return None;
    }
    let marker = SampleMarker::from_flag_bits(low)?;
    let value = (u16::from(high & PAYLOAD_MASK) << 5) | u16::from(low & PAYLOAD_MASK);
    Some((Sample::from_raw(value), marker))
}

/// Encodes a whole burst; only the last sample carries the end marker.
pub fn encode_burst(samples: &[Sample]) -> impl Iterator<Item = [u8; 2]> + '_ {
    let last = samples.len().saturating_sub(1);
    samples.iter().enumerate().map(move |(i, &sample)| {
        let marker = if i == last {
            SampleMarker::BurstEnd
        } else {
            SampleMarker::BurstLow
        };
        encode_sample(sample, marker)
    })
}

/// A host request, decoded from one command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Continuous(ContinuousRate),
    Burst(BurstRate),
    Run(RunState),
    Trigger(TriggerMode),
    Aux(bool),
    Input(Channel),
}

impl Command {
    /// Parses a line without its terminator. Only the letter and the first
    /// argument character are looked at; trailing bytes are ignored.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let (&letter, rest) = line.split_first()?;
        let &arg = rest.first()?;
        match letter {
            b'C' => ContinuousRate::from_digit(arg).map(Command::Continuous),
            b'B' => BurstRate::from_digit(arg).map(Command::Burst),
            b'R' => RunState::from_digit(arg).map(Command::Run),
            b'T' => TriggerMode::from_arg(arg).map(Command::Trigger),
            b'G' => match arg {
                b'0' => Some(Command::Aux(false)),
                b'1' => Some(Command::Aux(true)),
                _ => None,
            },
            b'A' => Channel::from_digit(arg).map(Command::Input),
            _ => None,
        }
    }

    /// The line a host sends for this command, terminator included.
    pub fn to_line(&self) -> String {
        match self {
            Command::Continuous(rate) => format!("C{}\n", rate.index()),
            Command::Burst(rate) => format!("B{}\n", rate.index()),
            Command::Run(state) => format!("R{}\n", state.index()),
            Command::Trigger(mode) => format!("T{}\n", mode.as_char()),
            Command::Aux(high) => format!("G{}\n", u8::from(*high)),
            Command::Input(channel) => format!("A{}\n", channel.index()),
        }
    }
}

/// Accumulates host bytes until a newline.
///
/// A line that outgrows [`CMD_LEN`] is thrown away, and so is everything up
/// to the next newline, so the tail of an over-long line is never taken for
/// a command.
#[derive(Debug, Clone)]
pub struct CommandLine {
    buf: [u8; CMD_LEN],
    len: usize,
    overflowed: bool,
}

impl CommandLine {
    pub fn new() -> Self {
        Self {
            buf: [0; CMD_LEN],
            len: 0,
            overflowed: false,
        }
    }

    /// Feeds one byte. Returns the command when a complete, recognised line
    /// has been received.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        if byte == b'\n' {
            let overflowed = self.overflowed;
            let line = &self.buf[..self.len];
            let command = if overflowed { None } else { Command::parse(line) };
            if command.is_none() && !overflowed {
                log::debug!(
                    "Ignoring command line {:?}",
                    String::from_utf8_lossy(line)
                );
            }
            self.reset();
            return command;
        }

        if self.overflowed {
            return None;
        }
        // Leave room for the terminator.
        if self.len + 1 >= CMD_LEN {
            log::debug!("Command line longer than {} bytes, dropping it", CMD_LEN);
            self.len = 0;
            self.overflowed = true;
            return None;
        }
        self.buf[self.len] = byte;
        self.len += 1;
        None
    }

    pub fn reset(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }

    /// Bytes buffered for the line in progress.
    pub fn pending(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new()
    }
}

/// What the host sees on the outbound stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    Sample { sample: Sample, marker: SampleMarker },
    Discard,
}

/// Host-side reassembly of the outbound byte stream.
#[derive(Debug, Clone, Default)]
pub struct StreamDecoder {
    high: Option<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) -> Option<StreamEvent> {
        if byte == DISCARD {
            self.high = None;
            return Some(StreamEvent::Discard);
        }
        if byte & FLAG_MASK == 0 {
            if let Some(orphan) = self.high.replace(byte) {
                log::trace!("High byte {:#04x} without a low byte", orphan);
            }
            return None;
        }
        let high = self.high.take()?;
        decode_pair(high, byte).map(|(sample, marker)| StreamEvent::Sample { sample, marker })
    }

    pub fn decode_all(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        bytes.iter().filter_map(|&b| self.push(b)).collect()
    }
}
