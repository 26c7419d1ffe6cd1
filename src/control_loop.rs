use std::sync::atomic::{AtomicBool, Ordering};

use crate::acquisition::{AcquisitionError, AcquisitionStateMachine, AuxOutput, CycleOutcome};
use crate::codec::CommandLine;
use crate::frame_buffer::NFRAME;
use crate::sample_source::Adc;
use crate::tick::{TickFlag, TickTimer};
use crate::transport::ByteTransport;

/// The cooperative main loop: host commands first, then at most one
/// acquisition cycle per tick.
pub struct ControlLoop<A, K, G, T, const N: usize = NFRAME> {
    machine: AcquisitionStateMachine<A, K, G, N>,
    transport: T,
    line: CommandLine,
    ticks: TickFlag,
}

impl<A, K, G, T, const N: usize> ControlLoop<A, K, G, T, N>
where
    A: Adc,
    K: TickTimer,
    G: AuxOutput,
    T: ByteTransport,
{
    pub fn new(machine: AcquisitionStateMachine<A, K, G, N>, transport: T, ticks: TickFlag) -> Self {
        Self {
            machine,
            transport,
            line: CommandLine::new(),
            ticks,
        }
    }

    /// Applies every command line that has fully arrived. A partial line
    /// stays buffered for the next call.
    pub fn drain_commands(&mut self) -> Result<usize, AcquisitionError> {
        let mut applied = 0;
        while let Some(byte) = self.transport.read_byte()? {
            if let Some(command) = self.line.push(byte) {
                self.machine.apply(command, &mut self.transport)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// One loop iteration. Returns the cycle outcome if a tick was pending.
    pub fn poll(&mut self) -> Result<Option<CycleOutcome>, AcquisitionError> {
        self.drain_commands()?;
        if !self.ticks.take() {
            return Ok(None);
        }
        self.machine.on_tick(&mut self.transport).map(Some)
    }

    /// Polls until `stop` is raised. Failed cycles are logged and skipped.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!("Control loop started: {:?}", self.machine.status());
        while !stop.load(Ordering::Relaxed) {
            match self.poll() {
                Ok(Some(outcome)) => log::trace!("Cycle: {:?}", outcome),
                Ok(None) => std::thread::yield_now(),
                Err(e) => log::warn!("Skipping cycle: {}", e),
            }
        }
        log::info!("Control loop stopped");
    }

    pub fn machine(&self) -> &AcquisitionStateMachine<A, K, G, N> {
        &self.machine
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (AcquisitionStateMachine<A, K, G, N>, T) {
        (self.machine, self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::RunState;
    use crate::codec::{StreamDecoder, StreamEvent, DISCARD};
    use crate::config::ScopeConfig;
    use crate::sample_source::Channel;
    use crate::sim::{MemoryTransport, RecordingPin, RecordingTicker, ScriptedAdc};
    use crate::tick::{tick_channel, TickNotifier};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    type Loop = ControlLoop<ScriptedAdc, RecordingTicker, RecordingPin, MemoryTransport>;

    fn control_loop(input: &[u8]) -> (Loop, TickNotifier) {
        let machine = AcquisitionStateMachine::new(
            ScriptedAdc::new((0..2048).map(|i| i % 1024)),
            RecordingTicker::new(),
            RecordingPin::new(),
            ScopeConfig::default().with_burst_pacing(None),
        );
        let (notifier, flag) = tick_channel();
        (
            ControlLoop::new(machine, MemoryTransport::with_input(input), flag),
            notifier,
        )
    }

    #[test]
    fn test_single_shot_from_host_commands() {
        let (mut scope, ticks) = control_loop(b"B1\nR2\n");

        ticks.notify();
        let outcome = scope.poll().unwrap();

        assert_eq!(outcome, Some(CycleOutcome::FrameSent { samples: NFRAME }));
        assert_eq!(scope.machine().run_state(), RunState::Stop);

        let events = StreamDecoder::new().decode_all(scope.transport().sent());
        assert_eq!(&events[..2], &[StreamEvent::Discard, StreamEvent::Discard]);
        let samples = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Sample { .. }))
            .count();
        assert_eq!(samples, NFRAME);
    }

    #[test]
    fn test_no_tick_no_cycle() {
        let (mut scope, _ticks) = control_loop(b"A1\n");

        assert_eq!(scope.poll().unwrap(), None);
        assert_eq!(scope.machine().channel(), Channel::Adc1);
        assert!(scope.transport().sent().is_empty());
    }

    #[test]
    fn test_coalesced_ticks_run_one_cycle() {
        let (mut scope, ticks) = control_loop(b"R0\n");
        ticks.notify();
        ticks.notify();

        assert_eq!(scope.poll().unwrap(), Some(CycleOutcome::Held));
        assert_eq!(scope.poll().unwrap(), None);
    }

    #[test]
    fn test_partial_line_survives_between_polls() {
        let (mut scope, _ticks) = control_loop(b"R");
        assert_eq!(scope.drain_commands().unwrap(), 0);

        scope.transport_mut().queue_input(b"2\n");
        assert_eq!(scope.drain_commands().unwrap(), 1);
        assert_eq!(scope.machine().run_state(), RunState::Single);
        assert_eq!(scope.transport().sent(), &[DISCARD]);
    }

    #[test]
    fn test_over_long_line_changes_nothing() {
        let (mut scope, _ticks) = control_loop(b"C1C1C1C1C1C1C1C1C1\n");
        let before = scope.machine().status();

        assert_eq!(scope.drain_commands().unwrap(), 0);
        assert_eq!(scope.machine().status(), before);
        assert!(scope.transport().sent().is_empty());
    }

    #[test]
    fn test_commands_apply_before_tick_cycle() {
        let (mut scope, ticks) = control_loop(b"R0\n");
        ticks.notify();
        assert_eq!(scope.poll().unwrap(), Some(CycleOutcome::Held));

        scope.transport_mut().queue_input(b"R1\n");
        ticks.notify();
        assert_eq!(
            scope.poll().unwrap(),
            Some(CycleOutcome::FrameSent { samples: NFRAME })
        );
    }

    #[test]
    fn test_run_stops_on_request() {
        let (mut scope, ticks) = control_loop(b"R0\n");
        let stop = Arc::new(AtomicBool::new(false));

        let stopper = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                ticks.notify();
                thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::Relaxed);
            })
        };
        scope.run(&stop);
        stopper.join().unwrap();

        let (machine, _) = scope.into_parts();
        assert_eq!(machine.run_state(), RunState::Stop);
    }
}
