mod repl;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use decorum_contracts::design::ImageData;
use decorum_contracts::models::CAPABILITY_TRANSCRIBE;
use decorum_engine::export::{export_version, export_video};
use decorum_engine::providers::default_provider_registry;
use decorum_engine::studio::StudioOptions;
use decorum_engine::transcription::{transcribe_stream, PcmFileSource};
use decorum_engine::{GenerationError, Studio, StudioConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "decorum", version, about = "Iterative room redesign with generative models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Redesign one photo and export the result.
    Generate(GenerateArgs),
    /// Render a walkthrough video of a photo.
    Video(VideoArgs),
    /// Transcribe a raw 16 kHz mono PCM file.
    Transcribe(TranscribeArgs),
    /// Interactive design session.
    Session(SessionArgs),
}

#[derive(Debug, Args)]
struct ProviderArgs {
    /// `gemini` or `dryrun` (offline).
    #[arg(long, default_value = "gemini")]
    provider: String,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    video_model: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    provider: ProviderArgs,
    #[arg(long)]
    room: Option<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long)]
    budget: Option<String>,
    #[arg(long)]
    mood: Option<String>,
    #[arg(long)]
    instructions: Option<String>,
    #[arg(long)]
    lock: Option<String>,
    #[arg(long = "preset")]
    presets: Vec<String>,
    #[arg(long)]
    inspiration: Option<PathBuf>,
    /// Reference item as `PATH` or `PATH=placement instruction`.
    #[arg(long = "item")]
    items: Vec<String>,
}

#[derive(Debug, Parser)]
struct VideoArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    provider: ProviderArgs,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long, default_value_t = 5)]
    motion: u8,
    #[arg(long, default_value = "720p")]
    resolution: String,
    #[arg(long, default_value = "16:9")]
    aspect: String,
    #[arg(long, default_value = "cinematic")]
    style: String,
}

#[derive(Debug, Parser)]
struct TranscribeArgs {
    #[arg(long)]
    pcm: PathBuf,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    provider: ProviderArgs,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            match err.downcast_ref::<GenerationError>() {
                Some(generation) => {
                    tracing::debug!("{err:#}");
                    eprintln!("decorum error: {}", generation.user_message());
                }
                None => eprintln!("decorum error: {err:#}"),
            }
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DECORUM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Video(args) => run_video(args),
        Command::Transcribe(args) => run_transcribe(args),
        Command::Session(args) => {
            let config = load_config(&args.provider);
            let studio = Arc::new(build_studio(&config, &args.provider, &args.out)?);
            if let Some(image) = args.image.as_ref() {
                let id = studio.upload_original(ImageData::from_path(image)?)?;
                println!("Loaded {} as {id}", image.display());
            }
            repl::run_session(studio, &config, &args.out)?;
            Ok(0)
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = load_config(&args.provider);
    let studio = build_studio(&config, &args.provider, &args.out)?;
    studio.upload_original(ImageData::from_path(&args.image)?)?;

    let fields = [
        ("room_type", args.room.as_deref()),
        ("style", args.style.as_deref()),
        ("budget", args.budget.as_deref()),
        ("mood", args.mood.as_deref()),
        ("instructions", args.instructions.as_deref()),
        ("locked_elements", args.lock.as_deref()),
    ];
    let inspiration = args
        .inspiration
        .as_deref()
        .map(ImageData::from_path)
        .transpose()?;
    let mut items = Vec::new();
    for raw in &args.items {
        let (path, instruction) = raw.split_once('=').unwrap_or((raw.as_str(), ""));
        items.push((ImageData::from_path(Path::new(path))?, instruction.to_string()));
    }
    studio.with_session(|session| -> Result<()> {
        for (field, value) in fields {
            if let Some(value) = value {
                repl::apply_design_field(&mut session.design, field, value)
                    .map_err(anyhow::Error::msg)?;
            }
        }
        for preset in &args.presets {
            session.design.toggle_preset(preset);
        }
        session.design.set_inspiration(inspiration);
        for (image, instruction) in items {
            session.design.add_custom_item(image, instruction);
        }
        Ok(())
    })?;

    let id = studio.generate_image()?;
    let exported = studio.with_session(|session| export_version(session, &id, &args.out))?;
    if let Some(insights) = studio.snapshot().graph.get(&id).and_then(|node| node.insights.clone()) {
        println!("{}", insights.vibe_summary);
    }
    println!("{id} -> {}", exported.artifact_path.display());
    Ok(0)
}

fn run_video(args: VideoArgs) -> Result<i32> {
    let config = load_config(&args.provider);
    let studio = build_studio(&config, &args.provider, &args.out)?;
    studio.upload_original(ImageData::from_path(&args.image)?)?;
    let motion = args.motion.to_string();
    let fields = [
        ("motion_intensity", motion.as_str()),
        ("resolution", args.resolution.as_str()),
        ("aspect_ratio", args.aspect.as_str()),
        ("style", args.style.as_str()),
        ("prompt", args.prompt.as_deref().unwrap_or("")),
    ];
    studio.with_session(|session| -> Result<()> {
        for (field, value) in fields {
            repl::apply_video_field(&mut session.video, field, value).map_err(anyhow::Error::msg)?;
        }
        Ok(())
    })?;

    let id = studio.generate_video()?;
    let exported = studio.with_session(|session| export_video(session, &id, &args.out))?;
    println!("{id} -> {}", exported.artifact_path.display());
    Ok(0)
}

fn run_transcribe(args: TranscribeArgs) -> Result<i32> {
    let mut config = StudioConfig::from_env();
    if args.model.is_some() {
        config.transcribe_model = args.model.clone();
    }
    let transcript = transcribe_file(&config, &args.pcm, true)?;
    println!("{transcript}");
    Ok(0)
}

pub(crate) fn transcribe_file(config: &StudioConfig, pcm: &Path, echo: bool) -> Result<String> {
    let api_key = config.require_api_key()?;
    let model = config.select_model(CAPABILITY_TRANSCRIBE, "gemini")?;
    let source = PcmFileSource::open(pcm)?;
    transcribe_stream(&config.live_ws_url, api_key, &model.model.name, source, |delta| {
        if echo {
            eprint!("{delta}");
        }
    })
    .context("live transcription failed")
}

fn load_config(args: &ProviderArgs) -> StudioConfig {
    let mut config = StudioConfig::from_env();
    if args.image_model.is_some() {
        config.image_model = args.image_model.clone();
    }
    if args.video_model.is_some() {
        config.video_model = args.video_model.clone();
    }
    config
}

fn build_studio(config: &StudioConfig, args: &ProviderArgs, out: &Path) -> Result<Studio> {
    let registry = default_provider_registry(config)?;
    let Some(model) = registry.get(&args.provider) else {
        bail!(
            "unknown provider '{}' (available: {})",
            args.provider,
            registry.names().join(", ")
        );
    };
    let mut options = StudioOptions::from_config(config, &args.provider)?;
    options.events_path = Some(
        args.events
            .clone()
            .unwrap_or_else(|| out.join("events.jsonl")),
    );
    Ok(Studio::new(model, options))
}
