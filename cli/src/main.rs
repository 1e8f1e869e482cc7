use clap::{Parser, Subcommand};
use hound::WavSpec;
use std::fs::File;
use std::path::PathBuf;
use tonelink_core::spectrum::SpectrumProbe;
use tonelink_core::{LinkError, Modem, NodeId, Packet, SAMPLE_RATE, SLOT_DURATION_MS};

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "Acoustic peer-to-peer link over near-ultrasonic tones")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modulate a packet to a WAV audio file
    Send {
        /// Target node id (4 hex digits, 0000 broadcasts, FFFF probes)
        #[arg(short, long)]
        target: NodeId,

        /// Sender node id (4 hex digits; random when omitted)
        #[arg(short, long)]
        sender: Option<NodeId>,

        /// Message text
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,
    },

    /// Demodulate a WAV recording and print every packet found
    Recv {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,
    },

    /// Draw and print a fresh node identity
    Identity,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Send {
            target,
            sender,
            message,
            output,
        } => send_command(target, sender, &message, &output)?,
        Commands::Recv { input } => recv_command(&input)?,
        Commands::Identity => println!("{}", NodeId::random()),
    }

    Ok(())
}

fn send_command(
    target: NodeId,
    sender: Option<NodeId>,
    message: &str,
    output_path: &PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let sender = sender.unwrap_or_else(NodeId::random);
    let packet = Packet::new(target, sender, message.as_bytes().to_vec());

    let modem = Modem::new();
    let samples = modem.transmit(&packet)?;
    println!(
        "Modulated {} payload bytes as {} samples ({} ms)",
        packet.payload.len(),
        samples.len(),
        samples.len() * 1000 / SAMPLE_RATE
    );

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = File::create(output_path)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for sample in samples {
        let clamped = sample.max(-1.0).min(1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    println!("Wrote {} from {} to {}", target, sender, output_path.display());
    Ok(())
}

fn recv_command(input_path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(input_path)
        .map_err(|e| LinkError::AudioDevice(format!("{}: {}", input_path.display(), e)))?;
    let mut reader = hound::WavReader::new(file)
        .map_err(|e| LinkError::AudioDevice(e.to_string()))?;

    let spec = reader.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );
    if spec.channels != 1 {
        return Err(LinkError::AudioDevice(format!("{} channels, need mono", spec.channels)).into());
    }

    let samples: Vec<f32> = match spec.bits_per_sample {
        16 => {
            let int_samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            int_samples?
                .into_iter()
                .map(|s| s as f32 / 32768.0)
                .collect()
        }
        32 => {
            let float_samples: Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            float_samples?
        }
        other => {
            return Err(LinkError::AudioDevice(format!("unsupported bit depth: {}", other)).into());
        }
    };

    // Eight analysis windows per symbol slot, matching the receiver's
    // debounce and gap discipline.
    let probe = SpectrumProbe::with_sample_rate(spec.sample_rate);
    let hop = (spec.sample_rate as usize * SLOT_DURATION_MS) / 1000 / 8;
    if hop == 0 {
        return Err(LinkError::AudioDevice(format!("sample rate {} too low", spec.sample_rate)).into());
    }

    let mut modem = Modem::new();
    let mut packets = 0usize;
    for window in samples.chunks_exact(hop) {
        if let Some(decoded) = modem.ingest(&probe.read(window)) {
            packets += 1;
            println!(
                "[{} -> {}] {} ({} corrected bits)",
                decoded.packet.sender,
                decoded.packet.target,
                String::from_utf8_lossy(&decoded.packet.payload),
                decoded.corrections
            );
        }
    }

    println!(
        "Done: {} packet(s), {} incomplete frame(s), {} corrected bits total",
        packets,
        modem.incomplete_frames(),
        modem.corrections_total()
    );
    Ok(())
}
