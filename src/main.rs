mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, EncodeArgs};

use webmify::batch::{BatchOptions, BatchProcessor};
use webmify::metadata::{
    Chooser, FilenameOnly, FirstMatch, MetadataLookup, PromptChooser, TmdbClient, TmdbLookup,
};
use wm_av::{FfprobeProber, MediaProbe, ProcessRunner, SystemRunner, ToolRegistry};
use wm_core::config::Config;
use wm_pipeline::{FileOptions, FilePipeline, SpecSettings, SubtitleMode};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "webmify=trace,wm_pipeline=trace,wm_av=debug,wm_core=debug".to_string()
        } else {
            "webmify=info,wm_pipeline=info,wm_av=info,wm_core=info".to_string()
        }
    });

    // stdout is reserved for prompts and reports
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load_or_default(cli.config.as_deref());
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }

    match cli.command {
        Commands::Encode(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            let all_ok = rt.block_on(encode(args, &config))?;
            if !all_ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, &config))
        }
        Commands::CheckTools => check_tools(&config),
        Commands::Version => {
            println!("webmify {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn encode(args: EncodeArgs, config: &Config) -> Result<bool> {
    if args.filename.is_some() && args.inputs.len() > 1 {
        anyhow::bail!("--filename only applies to a single input");
    }

    let tools = ToolRegistry::discover(&config.tools);
    let process: Arc<dyn ProcessRunner> = Arc::new(SystemRunner);
    let prober = FfprobeProber::new(&tools, process.clone())?;
    let ffmpeg = tools.require("ffmpeg")?.clone();
    let pipeline = FilePipeline::new(Arc::new(prober), ffmpeg, process);
    let metadata = metadata_lookup(config, args.first_match)?;

    let opts = batch_options(&args, config);
    if !opts.dry_run {
        std::fs::create_dir_all(&opts.output_dir)?;
    }

    let report = BatchProcessor::new(pipeline, metadata)
        .run(&args.inputs, &opts)
        .await;

    println!();
    for out in &report.encoded {
        println!("✓ {}", out.display());
    }
    for (input, err) in &report.failed {
        println!("✗ {} [{}]: {err}", input.display(), err.kind());
    }
    println!(
        "{} encoded, {} planned, {} failed",
        report.encoded.len(),
        report.planned.len(),
        report.failed.len()
    );

    Ok(report.is_success())
}

fn metadata_lookup(config: &Config, first_match: bool) -> Result<Arc<dyn MetadataLookup>> {
    let key = config
        .metadata
        .tmdb_api_key
        .clone()
        .or_else(|| std::env::var("TMDB_API_KEY").ok())
        .filter(|k| !k.is_empty());

    let Some(key) = key else {
        tracing::warn!("no TMDb API key configured; titles come from file names");
        return Ok(Arc::new(FilenameOnly));
    };

    let chooser: Box<dyn Chooser> = if first_match {
        Box::new(FirstMatch)
    } else {
        Box::new(PromptChooser::stdio())
    };
    let client = TmdbClient::new(&config.metadata, key)?;
    Ok(Arc::new(TmdbLookup::new(client, chooser)))
}

fn batch_options(args: &EncodeArgs, config: &Config) -> BatchOptions {
    let subtitles = if args.no_subs {
        SubtitleMode::None
    } else if args.external_subs {
        SubtitleMode::External
    } else {
        SubtitleMode::Embedded
    };
    let settings = SpecSettings {
        crf: args.crf.unwrap_or(config.encode.crf),
        threads: args.threads.unwrap_or(config.encode.threads),
        denoise: args.denoise,
        max_height: args.max_height,
        loudness: config.loudness.clone(),
        subtitle_style: config.subtitles.clone(),
    };
    let profile = args.profile.or(config.encode.default_profile);

    BatchOptions {
        output_dir: args.output.clone(),
        filename: args.filename.clone(),
        title: args.title.clone(),
        season: args.season.clone(),
        episode: args.episode.clone(),
        profile,
        file: FileOptions {
            // Replaced per file when no profile is forced.
            profile: profile.unwrap_or(wm_core::Profile::Webm),
            subtitles,
            burn_in: args.burn_subs,
            crop: args.crop,
            settings,
        },
        delete_original: args.delete,
        dry_run: args.dry_run,
    }
}

async fn probe_file(file: &Path, json: bool, config: &Config) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::new(&tools, Arc::new(SystemRunner))?;

    let channels = prober.audio_channels(file, 0).await?;
    let language = prober.audio_language(file, 0).await?;
    let height = prober.video_height(file, 0).await?;
    let color_space = prober.color_space(file, 0).await?;
    let subtitles = prober.subtitle_streams(file).await?;
    let parsed = wm_parser::parse(file);

    if json {
        let value = serde_json::json!({
            "file": file,
            "parsed": parsed,
            "audio": { "channels": channels, "language": language },
            "video": {
                "height": height,
                "color_space": color_space,
                "hdr": wm_pipeline::spec::is_hdr(&color_space),
            },
            "subtitles": subtitles,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Parsed title: {}", parsed.title);
    if let (Some(s), Some(e)) = (&parsed.season, &parsed.episode) {
        println!("Season {s}, episode {e}");
    }
    println!("\nAudio a:0: {channels} channels, language {:?}", language);
    println!(
        "Video v:0: {height}p, color space {:?}{}",
        color_space,
        if wm_pipeline::spec::is_hdr(&color_space) { " (HDR)" } else { "" }
    );
    println!("\nSubtitle Tracks: {}", subtitles.len());
    for s in &subtitles {
        println!("  [s:{}] {} {}", s.index, s.codec, s.language);
    }
    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({version})");
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to encode.");
    }

    Ok(())
}
