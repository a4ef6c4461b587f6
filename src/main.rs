use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use voice_assistant::api::ApiServerBuilder;
use voice_assistant::speech::{
    ConsoleVoice, Listener, MicrophoneSource, RelayVoice, Speaker, SpeechInput, SpeechOutput,
    UnavailableSource,
};
use voice_assistant::voice::{AudioCapture, SAMPLE_RATE, rms};
use voice_assistant::{
    CompletionClient, Config, DryRunOpener, Message, RelayClient, SiteOpener, SystemBrowser,
    TurnController,
};

/// Voice Assistant - push-to-talk conversational assistant
#[derive(Parser)]
#[command(name = "voice-assistant", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/voice-assistant/config.toml)
    #[arg(short, long, global = true, env = "VOICE_ASSISTANT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Interactive conversation: type a message, or press enter to talk
    Chat {
        #[command(flatten)]
        client: ClientArgs,

        /// Use the microphone and speakers
        #[arg(long)]
        voice: bool,

        /// Start with speech output muted
        #[arg(long)]
        mute: bool,
    },
    /// Run a single turn and print the conversation
    Ask {
        #[command(flatten)]
        client: ClientArgs,

        /// What to say
        text: String,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Call the LLM vendor directly with a local key instead of the relay
    #[arg(long)]
    direct: bool,

    /// Relay base URL
    #[arg(long)]
    relay_url: Option<String>,

    /// Log site requests instead of opening a browser
    #[arg(long)]
    no_browser: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_assistant=info",
        1 => "info,voice_assistant=debug",
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
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(&config, port).await,
        Command::Chat {
            client,
            voice,
            mute,
        } => chat(&config, &client, voice, mute).await,
        Command::Ask { client, text } => ask(&config, &client, &text).await,
        Command::TestMic { duration } => test_mic(duration).await,
    }
}

/// Run the relay until interrupted
async fn serve(config: &Config, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.server.port);

    let vendor = config.vendor_client();
    if !vendor.is_configured() {
        tracing::warn!("OPENAI_API_KEY not set: delegated chat and voice endpoints will fail");
    }

    let server = ApiServerBuilder::new(Arc::new(vendor), port)
        .transcriber(config.transcriber()?)
        .synthesizer(config.synthesizer()?)
        .rate_limit(config.server.rate_limit_per_minute)
        .build();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Wire a controller for the terminal client
fn build_controller(
    config: &Config,
    args: &ClientArgs,
    voice: bool,
) -> anyhow::Result<TurnController> {
    let relay_url = args.relay_url.as_deref().unwrap_or(&config.client.relay_url);
    let relay = Arc::new(RelayClient::new(relay_url)?);

    let completion: Arc<dyn CompletionClient> = if args.direct {
        let vendor = config.vendor_client();
        if !vendor.is_configured() {
            tracing::warn!("--direct without OPENAI_API_KEY: every delegated turn will fail");
        }
        tracing::info!(model = %config.llm.model, "calling vendor directly");
        Arc::new(vendor)
    } else {
        tracing::info!(url = %relay.chat_url(), "using relay");
        relay.clone()
    };

    let (input, output): (Box<dyn SpeechInput>, Box<dyn SpeechOutput>) = if voice {
        (
            Box::new(Listener::new(MicrophoneSource::new(
                relay.clone(),
                config.voice.listen_timeout,
            ))),
            Box::new(Speaker::new(RelayVoice::new(relay))),
        )
    } else {
        (
            Box::new(Listener::new(UnavailableSource)),
            Box::new(Speaker::new(ConsoleVoice)),
        )
    };

    let opener: Arc<dyn SiteOpener> = if args.no_browser {
        Arc::new(DryRunOpener)
    } else {
        match SystemBrowser::detect() {
            Ok(browser) => Arc::new(browser),
            Err(e) => {
                tracing::warn!(error = %e, "sites will be logged instead of opened");
                Arc::new(DryRunOpener)
            }
        }
    };

    Ok(TurnController::new(input, output, completion, opener).with_config(config.turn_config()))
}

/// Interactive turn loop
async fn chat(config: &Config, args: &ClientArgs, voice: bool, mute: bool) -> anyhow::Result<()> {
    let mut controller = build_controller(config, args, voice)?;
    controller.set_muted(mute);

    println!("Voice Assistant");
    if voice {
        println!("Press enter to talk, or type a message.");
    } else {
        println!("Type a message.");
    }
    println!("Commands: /mute, /unmute, /quit\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut shown = 0;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let outcome = match line.trim() {
            "/quit" => break,
            "/mute" => {
                controller.set_muted(true);
                println!("(muted)");
                continue;
            }
            "/unmute" => {
                controller.set_muted(false);
                println!("(unmuted)");
                continue;
            }
            "" if voice => controller.start_capture().map(|()| println!("Listening...")),
            "" => continue,
            text => controller.submit_text(text),
        };

        if let Err(e) = outcome {
            println!("({e})");
            continue;
        }

        controller.run_until_idle().await;

        if let Some(err) = controller.take_capture_error() {
            println!("({err})");
        }

        let messages = controller.conversation().messages();
        for message in &messages[shown..] {
            print_message(message);
        }
        shown = messages.len();

        if controller.is_degraded() {
            println!("(assistant unavailable)");
        }
    }

    controller.finish_site_open().await;
    Ok(())
}

/// One turn from the command line
async fn ask(config: &Config, args: &ClientArgs, text: &str) -> anyhow::Result<()> {
    let mut controller = build_controller(config, args, false)?;

    controller.submit_text(text)?;
    controller.run_until_idle().await;
    controller.finish_site_open().await;

    for message in controller.conversation().messages() {
        print_message(message);
    }

    if controller.is_degraded() {
        anyhow::bail!("completion failed");
    }

    Ok(())
}

fn print_message(message: &Message) {
    let speaker = if message.is_user { "You" } else { "Assistant" };
    let time = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M");
    println!("[{time}] {speaker}: {}", message.text);
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = rms(&samples);
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

        capture.clear_buffer();
    }

    capture.stop();
    println!("\n---");
    println!("Microphone test complete!");
    println!("If RMS values above 0.03 appear while speaking, speech will be detected.");

    Ok(())
}
