// Simulated acquisition
//
// Runs the full pipeline against a software ADC, feeds it host commands and
// decodes what would have gone over the wire.

use clap::Parser;
use uart_scope::sim::{MemoryTransport, RecordingPin, RecordingTicker, Signal, SimulatedAdc, Waveform};
use uart_scope::{
    tick_channel, AcquisitionStateMachine, Channel, ControlLoop, CycleOutcome,
    ScopeConfig, StreamDecoder, StreamEvent, TriggerLevel,
};

#[derive(Parser)]
#[command(name = "simulated_scope")]
#[command(version = "1.0")]
#[command(about = "Run the acquisition core against a simulated signal")]
#[command(long_about = "Feeds host command lines to the acquisition core, runs a number of ticks against a software ADC and prints the frames the host would receive.")]
struct Args {
    /// Command lines to send before the first tick, e.g. B2 TP R2
    commands: Vec<String>,

    /// Test signal shape
    #[arg(short, long, default_value = "sine", value_parser = ["sine", "square", "triangle", "ekg"])]
    waveform: String,

    /// Test signal frequency in Hz
    #[arg(short, long, default_value_t = 1_000.0)]
    frequency: f64,

    /// Number of ticks to run
    #[arg(short, long, default_value_t = 3)]
    ticks: u32,

    /// Trigger level in raw counts (0-1023)
    #[arg(short, long, default_value_t = 512)]
    level: u16,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    #[cfg(feature = "cpu-profiling")]
    let _tracy = tracy_client::Client::start();

    let waveform = Waveform::ALL
        .into_iter()
        .find(|w| w.as_str() == args.waveform)
        .unwrap_or(Waveform::Sine);

    println!("Simulated Scope");
    println!("===============");
    println!("Signal: {} at {} Hz", waveform.as_str(), args.frequency);

    let adc = SimulatedAdc::new().with_signal(Channel::Adc0, Signal::new(waveform, args.frequency));
    let config = ScopeConfig::default()
        .with_trigger_level(TriggerLevel::new(args.level)?)
        .with_burst_pacing(None);
    let machine: AcquisitionStateMachine<_, _, _> = AcquisitionStateMachine::new(adc, RecordingTicker::new(), RecordingPin::new(), config);

    let mut input = String::new();
    for command in &args.commands {
        input.push_str(command);
        input.push('\n');
    }

    let (ticks, flag) = tick_channel();
    let mut scope = ControlLoop::new(machine, MemoryTransport::with_input(input.as_bytes()), flag);
    let mut decoder = StreamDecoder::new();

    scope.drain_commands()?;
    println!("Status: {:?}\n", scope.machine().status());

    for tick in 0..args.ticks {
        ticks.notify();
        let outcome = scope.poll()?;
        let bytes = scope.transport_mut().take_sent();
        let events = decoder.decode_all(&bytes);

        match outcome {
            Some(CycleOutcome::FrameSent { samples }) => {
                println!("Tick {}: frame of {} samples", tick, samples);
                print_frame_summary(&events);
            }
            Some(other) => println!("Tick {}: {:?}", tick, other),
            None => println!("Tick {}: no cycle", tick),
        }
    }

    Ok(())
}

// Helper function to print basic statistics about a decoded frame
fn print_frame_summary(events: &[StreamEvent]) {
    let mut values = Vec::new();
    let mut discards = 0;
    let mut closed = false;

    for event in events {
        match event {
            StreamEvent::Sample { sample, marker } => {
                values.push(sample.value());
                closed |= marker.is_end();
            }
            StreamEvent::Discard => discards += 1,
        }
    }

    if values.is_empty() {
        return;
    }
    let min = values.iter().min().copied().unwrap_or_default();
    let max = values.iter().max().copied().unwrap_or_default();
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64;

    println!("   Range: {} to {} (mean: {:.1})", min, max, mean);
    println!("   First: {:?}", &values[..values.len().min(8)]);
    println!("   End marker: {}, discards: {}", closed, discards);
}
