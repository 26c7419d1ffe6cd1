// Serial device
//
// Runs the acquisition core on a real serial port so a host application can
// talk to it as if a board were attached. Samples come from a simulated ADC.

use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uart_scope::sim::{Signal, SimulatedAdc, Waveform};
use uart_scope::{
    tick_channel, AcquisitionStateMachine, AuxOutput, Channel, ControlLoop, ScopeConfig,
    SerialTransport, ThreadTicker, FRAME_SYNC_HZ,
};

#[derive(Parser)]
#[command(name = "serial_device")]
#[command(version = "1.0")]
#[command(about = "Serve the scope protocol on a serial port")]
#[command(long_about = "Opens a serial port and runs the acquisition control loop on it, feeding a simulated signal into every ADC input.")]
struct Args {
    /// Serial port to serve on (e.g. /dev/ttyUSB0)
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = ScopeConfig::DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Test signal shape
    #[arg(short, long, default_value = "sine", value_parser = ["sine", "square", "triangle", "ekg"])]
    waveform: String,

    /// Test signal frequency in Hz
    #[arg(short, long, default_value_t = 1_000.0)]
    frequency: f64,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

/// Auxiliary output that only reports level changes.
struct LoggedPin;

impl AuxOutput for LoggedPin {
    fn set_level(&mut self, high: bool) {
        log::info!("Auxiliary output {}", if high { "high" } else { "low" });
    }
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
    let signal = Signal::new(waveform, args.frequency);
    let adc = Channel::ALL
        .into_iter()
        .fold(SimulatedAdc::new(), |adc, channel| adc.with_signal(channel, signal));

    let config = ScopeConfig::default().with_baud_rate(args.baud);
    let transport = SerialTransport::open(&args.port, config.baud_rate)?;
    let (notifier, flag) = tick_channel();
    let ticker = ThreadTicker::spawn(notifier, FRAME_SYNC_HZ);

    let machine: AcquisitionStateMachine<_, _, _> = AcquisitionStateMachine::new(adc, ticker, LoggedPin, config);
    let mut scope = ControlLoop::new(machine, transport, flag);

    println!("Serving {} at {} baud ({} at {} Hz)", args.port, args.baud, waveform.as_str(), args.frequency);
    println!("Send B0-B3, C0-C3, R0-R2, TF/TP/TN, A0-A3 or G0/G1. Ctrl-C to stop.");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut line = String::new();
            // Enter on stdin also stops the loop
            let _ = std::io::stdin().read_line(&mut line);
            stop.store(true, Ordering::Relaxed);
        });
    }

    scope.run(&stop);
    Ok(())
}
