use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oracle_gateway::api::ApiServerBuilder;
use oracle_gateway::experiences::{self, PastLifeSettings};
use oracle_gateway::voice::{FallbackInput, InputSource, MicrophoneInput, Transcriber, TypedInput};
use oracle_gateway::{Config, Oracle, Persona};

/// Oracle - novelty AI oracles for the terminal and the web
#[derive(Parser)]
#[command(name = "oracle", version, about)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "ORACLE_CONFIG")]
    config: Option<PathBuf>,

    /// API key; falls back to `OPENAI_API_KEY`, then a prompt
    #[arg(long)]
    api_key: Option<String>,

    /// Never prompt for a missing API key
    #[arg(long)]
    no_prompt: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with a persona until you say "exit"
    Chat {
        /// Persona to talk to
        #[arg(short, long, default_value = "emoji-oracle")]
        persona: String,
        /// Speak instead of typing, falling back to the keyboard
        #[arg(long)]
        voice: bool,
        /// Stop after this many questions
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// Generate a sacred symbol for a name
    Symbol {
        /// Whose symbol to draw
        name: String,
    },
    /// Ask a persona about an image file or URL
    Describe {
        /// Image path or http(s) URL
        image: String,
        /// Question about the image
        #[arg(short, long)]
        question: Option<String>,
        #[arg(short, long, default_value = "grandmother-helper")]
        persona: String,
    },
    /// Play the image telephone game
    Telephone {
        /// Starting prompt
        prompt: String,
        /// Number of image/description cycles
        #[arg(short, long, default_value = "5")]
        cycles: usize,
        /// Seconds to wait between cycles
        #[arg(long, default_value = "2")]
        pause: u64,
        #[arg(short, long, default_value = "telephone-kid")]
        persona: String,
    },
    /// Learn who you were in a past life
    PastLife {
        /// Your name; asked for when omitted
        name: Option<String>,
        /// Follow-up questions allowed
        #[arg(long, default_value = "5")]
        questions: usize,
        /// Skip the portrait
        #[arg(long)]
        no_portrait: bool,
        /// Speak questions instead of typing
        #[arg(long)]
        voice: bool,
    },
    /// Receive a proverb
    Proverb {
        #[arg(short, long, default_value = "pythia")]
        persona: String,
    },
    /// Ask about the weather
    Weather {
        /// Speak questions instead of typing
        #[arg(long)]
        voice: bool,
    },
    /// Serve the oracle over HTTP
    Serve {
        #[arg(short, long, default_value = "emoji-oracle")]
        persona: String,
        /// Port to listen on, overriding the config
        #[arg(long)]
        port: Option<u16>,
    },
    /// List built-in personas
    Personas,
    /// Record a clip and report its level
    TestMic,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,oracle_gateway=info",
        1 => "info,oracle_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(base_url = %config.base_url, "loaded configuration");

    let connect = || -> anyhow::Result<Oracle> {
        let credential = config
            .credential_resolver(!cli.no_prompt)
            .with_explicit(cli.api_key.clone().or_else(|| config.api_key.clone()))
            .resolve()?;
        tracing::debug!(source = ?credential.source(), "resolved API key");
        Ok(Oracle::from_config(&config, &credential))
    };
    let persona = |id: &str| Persona::load(id, config.personas_dir.as_deref());

    match cli.command {
        Command::Chat {
            persona: id,
            voice,
            max_turns,
        } => {
            let persona = persona(&id)?;
            let oracle = connect()?;
            let input = input_source(&config, &oracle, voice);
            let summary = experiences::run_chat(&oracle, &persona, input.as_ref(), max_turns).await?;
            tracing::info!(answered = summary.answered, failed = summary.failed, "chat finished");
        }
        Command::Symbol { name } => {
            let oracle = connect()?;
            let path = experiences::sacred_symbol(&oracle, &name).await?;
            println!("Your sacred symbol has been saved to {}", path.display());
        }
        Command::Describe {
            image,
            question,
            persona: id,
        } => {
            let persona = persona(&id)?;
            let oracle = connect()?;
            let answer =
                experiences::describe_image(&oracle, &persona, &image, question.as_deref()).await?;
            println!("{answer}");
        }
        Command::Telephone {
            prompt,
            cycles,
            pause,
            persona: id,
        } => {
            let persona = persona(&id)?;
            let oracle = connect()?;
            let report = experiences::run_telephone(
                &oracle,
                &persona,
                &prompt,
                cycles,
                Duration::from_secs(pause),
            )
            .await?;
            report.outcome.into_result()?;
        }
        Command::PastLife {
            name,
            questions,
            no_portrait,
            voice,
        } => {
            let storyteller = persona("storyteller")?;
            let seer = persona("past-life")?;
            let oracle = connect()?;
            let input = input_source(&config, &oracle, voice);
            let player = config.player();
            let settings = PastLifeSettings {
                max_questions: questions,
                portrait: !no_portrait,
            };
            experiences::run_past_life(
                &oracle,
                &storyteller,
                &seer,
                name.as_deref(),
                input.as_ref(),
                player.as_ref(),
                &settings,
            )
            .await?;
        }
        Command::Proverb { persona: id } => {
            let persona = persona(&id)?;
            let oracle = connect()?;
            println!("{}", experiences::proverb(&oracle, &persona).await?);
        }
        Command::Weather { voice } => {
            let persona = persona("weather")?;
            let oracle = connect()?;
            let input = input_source(&config, &oracle, voice);
            let player = config.player();
            experiences::run_weather(&oracle, &persona, input.as_ref(), player.as_ref()).await?;
        }
        Command::Serve { persona: id, port } => {
            let persona = persona(&id)?;
            let oracle = connect()?;
            let mut builder = ApiServerBuilder::new(oracle, persona).server(&config.server);
            if let Some(port) = port {
                builder = builder.port(port);
            }
            builder.build().run().await?;
        }
        Command::Personas => {
            for id in Persona::embedded_ids() {
                let persona = persona(id)?;
                match &persona.tagline {
                    Some(tagline) => println!("{id:20} {} - {tagline}", persona.name),
                    None => println!("{id:20} {}", persona.name),
                }
            }
        }
        Command::TestMic => {
            println!("Recording for {} seconds...", config.voice.record_duration.as_secs());
            let recording = config.recorder().record().await?;
            println!(
                "Captured {:.1}s, RMS {:.4}",
                recording.stats.duration.as_secs_f32(),
                recording.stats.rms
            );
        }
    }

    Ok(())
}

/// Keyboard input, or the microphone with the keyboard as fallback
fn input_source(config: &Config, oracle: &Oracle, voice: bool) -> Box<dyn InputSource> {
    if !voice {
        return Box::new(TypedInput);
    }

    let transcriber: Arc<dyn Transcriber> = Arc::new(oracle.clone());
    Box::new(FallbackInput::new(vec![
        Box::new(MicrophoneInput::new(config.recorder(), transcriber)),
        Box::new(TypedInput),
    ]))
}
