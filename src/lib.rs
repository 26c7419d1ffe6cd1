//! # uart-scope
//!
//! Acquisition and transfer core for a UART-tethered oscilloscope front end.
//!
//! The crate samples one analog input, waits for a level-crossing trigger,
//! frames the waveform into a compact two-bytes-per-sample serial protocol
//! and takes single-line ASCII commands from the host to change sample
//! rate, trigger polarity, run state, input channel and an auxiliary output.
//!
//! ## Features
//!
//! - **Hardware behind traits**: [`Adc`], [`ByteTransport`], [`TickTimer`]
//!   and [`AuxOutput`] are all the core needs from a board
//! - **Burst and continuous acquisition**: whole frames at up to 192 kHz, or
//!   one sample per tick for slow roll mode
//! - **Edge triggers** with a bounded retry budget
//! - **Lenient command decoding**: unknown commands are ignored, never
//!   answered with an error
//! - **Host-side helpers**: [`StreamDecoder`] for the outbound stream and
//!   [`SerialTransport`] to run the core on a real UART
//! - **Simulation**: the [`sim`] module provides software ADCs and links
//!
//! ## Examples
//!
//! ### Encoding a sample
//!
//! ```rust
//! use uart_scope::{encode_sample, Sample, SampleMarker};
//!
//! let bytes = encode_sample(Sample::from_raw(683), SampleMarker::BurstLow);
//! assert_eq!(bytes, [21, 0x2b]);
//! ```
//!
//! ### Driving the control loop
//!
//! ```rust
//! use uart_scope::sim::{MemoryTransport, RecordingPin, RecordingTicker, ScriptedAdc};
//! use uart_scope::{
//!     tick_channel, AcquisitionStateMachine, ControlLoop, CycleOutcome, RunState, ScopeConfig,
//!     NFRAME,
//! };
//!
//! let machine: AcquisitionStateMachine<_, _, _> = AcquisitionStateMachine::new(
//!     ScriptedAdc::new(0..1024),
//!     RecordingTicker::new(),
//!     RecordingPin::new(),
//!     ScopeConfig::default().with_burst_pacing(None),
//! );
//! let (ticks, flag) = tick_channel();
//! let mut scope = ControlLoop::new(machine, MemoryTransport::with_input(b"B1\nR2\n"), flag);
//!
//! ticks.notify();
//! let outcome = scope.poll()?;
//!
//! assert_eq!(outcome, Some(CycleOutcome::FrameSent { samples: NFRAME }));
//! assert_eq!(scope.machine().run_state(), RunState::Stop);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Running on a serial port
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use uart_scope::sim::{RecordingPin, SimulatedAdc};
//! use uart_scope::{
//!     tick_channel, AcquisitionStateMachine, ControlLoop, ScopeConfig, SerialTransport,
//!     ThreadTicker, FRAME_SYNC_HZ,
//! };
//!
//! let config = ScopeConfig::default();
//! let transport = SerialTransport::open("/dev/ttyUSB0", config.baud_rate)?;
//! let (notifier, flag) = tick_channel();
//! let ticker = ThreadTicker::spawn(notifier, FRAME_SYNC_HZ);
//!
//! let machine: AcquisitionStateMachine<_, _, _> = AcquisitionStateMachine::new(SimulatedAdc::new(), ticker, RecordingPin::new(), config);
//! let mut scope = ControlLoop::new(machine, transport, flag);
//! scope.run(&AtomicBool::new(false));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod acquisition;
pub mod codec;
pub mod config;
pub mod control_loop;
pub mod frame_buffer;
pub mod sample_source;
pub mod sim;
pub mod tick;
pub mod transport;
pub mod trigger;

// Re-export the main types for convenience
pub use acquisition::{
    AcquisitionError, AcquisitionMode, AcquisitionStateMachine, AuxOutput, BurstRate,
    ContinuousRate, CycleOutcome, RunState, ScopeStatus, CONTINUOUS_ADC_HZ, FRAME_SYNC_HZ,
};

pub use codec::{
    decode_pair, encode_burst, encode_sample, Command, CommandLine, SampleMarker, StreamDecoder,
    StreamEvent, CMD_LEN, DISCARD,
};

pub use config::{BurstPacing, ConfigError, ScopeConfig};

pub use control_loop::ControlLoop;

pub use frame_buffer::{FrameBuffer, NFRAME};

pub use sample_source::{
    Adc, Channel, Sample, SampleSource, SampleSourceError, StallPolicy, SAMPLE_MAX,
};

pub use tick::{tick_channel, ThreadTicker, TickFlag, TickNotifier, TickTimer};

pub use transport::{ByteTransport, SerialTransport, TransportError};

pub use trigger::{TriggerDetector, TriggerLevel, TriggerMode, TriggerOutcome};
