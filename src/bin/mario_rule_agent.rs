use mario_rule_agent::vision::to_grey;
use mario_rule_agent::{locate_objects, AgentConfig, Catalog, MarioStatus, TemplateManifest, Theme};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use opencv::imgcodecs;
use opencv::prelude::*;

use std::path::{Path, PathBuf};

// Sprite directory used when no manifest is given
const SPRITES_DIR: &str = "sprites";

#[derive(Parser)]
#[command(name = "mario_rule_agent", about = "Rule-based Super Mario Bros. agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find Mario, enemies and terrain in a single screenshot
    Locate(LocateArgs),
    /// Play the game on the built-in emulator
    #[cfg(feature = "nes")]
    Play(PlayArgs),
}

#[derive(Parser)]
struct TemplateArgs {
    /// JSON manifest listing the template files per object kind
    #[arg(long)]
    templates: Option<PathBuf>,
    /// Directory with the standard ground-level sprites, used without a manifest
    #[arg(long, default_value = SPRITES_DIR)]
    sprites: PathBuf,
    /// Overrides the manifest's level theme
    #[arg(long, value_enum)]
    theme: Option<ThemeArg>,
    /// JSON file with policy and controller settings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser)]
struct LocateArgs {
    #[arg(long)]
    frame: PathBuf,
    #[arg(long, value_enum, default_value = "small")]
    status: StatusArg,
    #[command(flatten)]
    templates: TemplateArgs,
}

#[cfg(feature = "nes")]
#[derive(Parser)]
struct PlayArgs {
    #[arg(long)]
    rom: PathBuf,
    #[arg(long, default_value = "1")]
    episodes: usize,
    #[arg(long, default_value = "1")]
    frame_skip: u32,
    /// Stop at the first death or flagpole
    #[arg(long, default_value_t = false)]
    single_stage: bool,
    /// Overrides the configured frame budget per episode
    #[arg(long)]
    max_frames: Option<u64>,
    #[command(flatten)]
    templates: TemplateArgs,
}

#[derive(Copy, Clone, ValueEnum)]
enum ThemeArg {
    Ground,
    Underground,
    Castle,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Theme {
        match theme {
            ThemeArg::Ground => Theme::Ground,
            ThemeArg::Underground => Theme::Underground,
            ThemeArg::Castle => Theme::Castle,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum StatusArg {
    Small,
    Tall,
    Fireball,
}

impl From<StatusArg> for MarioStatus {
    fn from(status: StatusArg) -> MarioStatus {
        match status {
            StatusArg::Small => MarioStatus::Small,
            StatusArg::Tall => MarioStatus::Tall,
            StatusArg::Fireball => MarioStatus::Fireball,
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("Failed to read config: {}", path.display())),
        None => Ok(AgentConfig::default()),
    }
}

fn load_catalog(args: &TemplateArgs) -> Result<Catalog> {
    let mut manifest = match &args.templates {
        Some(path) => TemplateManifest::from_file(path)
            .with_context(|| format!("Failed to read template manifest: {}", path.display()))?,
        None => TemplateManifest::ground(&args.sprites),
    };
    if let Some(theme) = args.theme {
        manifest.theme = theme.into();
    }
    let catalog = Catalog::load(&manifest).context("Failed to load templates")?;
    tracing::info!("Loaded templates from {}", manifest.root.display());
    Ok(catalog)
}

fn locate(args: &LocateArgs) -> Result<()> {
    let config = load_config(args.templates.config.as_deref())?;
    let catalog = load_catalog(&args.templates)?;
    let frame = imgcodecs::imread(&args.frame.to_string_lossy(), imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        bail!("Failed to open frame: {}", args.frame.display());
    }

    let locations = locate_objects(
        &to_grey(&frame)?,
        &catalog,
        args.status.into(),
        config.match_threshold,
    )?;
    tracing::info!("{} objects found", locations.len());
    println!("{}", serde_json::to_string_pretty(&locations)?);
    Ok(())
}

#[cfg(feature = "nes")]
fn play(args: &PlayArgs) -> Result<()> {
    use mario_rule_agent::nes::env::{EnvConfig, NesEnv};
    use mario_rule_agent::run_episode;

    let mut config = load_config(args.templates.config.as_deref())?;
    if let Some(max_frames) = args.max_frames {
        config.max_frames = max_frames;
    }
    let catalog = load_catalog(&args.templates)?;
    let mut env = NesEnv::new(
        &args.rom,
        EnvConfig {
            frame_skip: args.frame_skip,
            single_stage: args.single_stage,
            ..EnvConfig::default()
        },
    )
    .with_context(|| format!("Failed to start emulator with ROM: {}", args.rom.display()))?;

    for episode in 1..=args.episodes {
        let report = run_episode(&mut env, &catalog, &config)
            .with_context(|| format!("Episode {} failed", episode))?;
        if report.out_of_frames() {
            tracing::warn!("Episode {} hit the {} frame budget", episode, config.max_frames);
        }
        println!("{}", serde_json::to_string(&report)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Locate(args) => locate(args),
        #[cfg(feature = "nes")]
        Commands::Play(args) => play(args),
    }
}
