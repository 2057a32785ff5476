use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voxwallet::provider::{SynthesisRequest, TranscriptionRequest};
use voxwallet::voice::{AudioCapture, PlaybackChain, PlaybackOutcome, samples_to_wav};
use voxwallet::{
    CommandDispatcher, Config, ConsoleNotifier, DemoWallet, GatewayServer, ResilientClient,
    SharedNotifier, VoicePipeline, Voice,
};

/// Voxwallet - voice commands for a crypto wallet demo
#[derive(Parser)]
#[command(name = "voxwallet", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Serve every speech call from simulation
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for one voice command and act on it
    Listen {
        /// Seconds to record
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Transcribe a WAV file
    Transcribe {
        /// Path to the audio file
        file: PathBuf,
    },
    /// Synthesize text and play it
    Speak {
        /// Text to speak
        text: String,
        /// Voice to use
        #[arg(long)]
        voice: Option<Voice>,
    },
    /// Run the speech gateway
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voxwallet=info",
        1 => "info,voxwallet=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if cli.simulate {
        config.provider.simulation_only = true;
    }

    let notifier: SharedNotifier = Arc::new(ConsoleNotifier);

    match cli.command {
        Command::Listen { seconds } => {
            let listen_for = seconds.map_or(config.voice.listen_for, Duration::from_secs);
            listen(&config, notifier, listen_for).await
        }
        Command::Transcribe { file } => transcribe(&config, notifier, &file).await,
        Command::Speak { text, voice } => {
            speak(&config, notifier, &text, voice.unwrap_or(config.voice.voice)).await
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                config.gateway.port = port;
            }
            GatewayServer::from_config(&config.gateway)?.run().await?;
            Ok(())
        }
        Command::TestMic { duration } => test_mic(&config, duration).await,
        Command::TestSpeaker => test_speaker(notifier).await,
    }
}

/// Build the resilient client and start its health reset timer
fn resilient_client(
    config: &Config,
    notifier: SharedNotifier,
) -> anyhow::Result<ResilientClient> {
    let client = ResilientClient::from_config(config, notifier)?;
    // Detached; lives as long as the runtime
    drop(
        client
            .health()
            .spawn_reset_task(config.resilience.reset_interval),
    );
    Ok(client)
}

/// Run one voice turn
#[allow(clippy::future_not_send)]
async fn listen(
    config: &Config,
    notifier: SharedNotifier,
    listen_for: Duration,
) -> anyhow::Result<()> {
    let client = resilient_client(config, Arc::clone(&notifier))?;
    let dispatcher = CommandDispatcher::new(Arc::new(DemoWallet::new()), Arc::clone(&notifier));
    let playback = PlaybackChain::system(Arc::clone(&notifier));

    let mut pipeline = VoicePipeline::new(
        AudioCapture::new(config.voice.constraints),
        client,
        dispatcher,
        playback,
        notifier,
    )
    .with_voice(config.voice.voice)
    .speak_responses(config.voice.speak_responses);

    println!("Listening for {} seconds...", listen_for.as_secs());
    let report = pipeline.run_turn(listen_for).await;

    println!("Heard:   \"{}\" ({})", report.transcript, report.source);
    println!("Command: {}", report.command);
    println!("Reply:   {}", report.reply);

    Ok(())
}

/// Transcribe an audio file through the resilient client
async fn transcribe(
    config: &Config,
    notifier: SharedNotifier,
    file: &std::path::Path,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)?;
    let client = resilient_client(config, notifier)?;

    let served = client
        .transcribe(&TranscriptionRequest::Audio(STANDARD.encode(bytes)))
        .await;

    println!("{}", served.value);
    tracing::info!(source = %served.source, "transcription served");
    Ok(())
}

/// Synthesize text and play it through the playback chain
async fn speak(
    config: &Config,
    notifier: SharedNotifier,
    text: &str,
    voice: Voice,
) -> anyhow::Result<()> {
    let client = resilient_client(config, Arc::clone(&notifier))?;
    let speech = client.synthesize(&SynthesisRequest::new(text, voice)).await;
    println!("Synthesized ({}), playing...", speech.source);

    PlaybackChain::system(notifier)
        .play(Some(&speech.value.audio_content))
        .await?;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(config.voice.constraints);
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave through the playback chain
async fn test_speaker(notifier: SharedNotifier) -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let payload = STANDARD.encode(samples_to_wav(&samples, sample_rate));
    let chain = PlaybackChain::system(notifier);
    println!("Strategies: {}", chain.strategy_names().join(" -> "));

    match chain.play(Some(&payload)).await? {
        PlaybackOutcome::Played { strategy, failures } => {
            for failure in failures {
                println!("  skipped {failure}");
            }
            println!("Played with {strategy}");
        }
        PlaybackOutcome::Skipped => println!("Nothing to play"),
    }

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
