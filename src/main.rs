mod already_processed;
mod cli;
mod config;
mod cookies;
mod corrector;
mod io;
mod logging;
mod namer;
mod orchestrator;
mod outside;
mod pipeline;
mod resolver;
mod result;
mod selection;
mod types;

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use miette::{Context, IntoDiagnostic};
use time::OffsetDateTime;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    already_processed::AlreadyProcessed,
    cli::Args,
    config::Settings,
    cookies::CookieFile,
    orchestrator::Orchestrator,
    outside::{Ffmpeg, SpaceDownloader, TwspaceDl, Ytdl},
    pipeline::{Pipeline, Summary},
    resolver::{merge_spaces, resolve_links, search_profiles, XApi},
    types::Space,
};

fn main() -> miette::Result<ExitCode> {
    let args = Args::parse();
    logging::init_logging(if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    })?;

    let settings = Settings::load(args.config.as_deref())?;
    debug!("{settings:?}");

    let cookies = CookieFile::load(&args.cookie)?;
    info!(
        "Loaded {} cookies from {}",
        cookies.cookies().len(),
        cookies.path().display()
    );

    let output_dir = args.output_dir();
    std::fs::create_dir_all(&output_dir)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not create {}", output_dir.display()))?;

    let spaces = find_spaces(&args, &settings)?;
    if spaces.is_empty() {
        error!("No spaces to download");
        return Ok(ExitCode::FAILURE);
    }

    let strategies = load_downloaders(&settings)?;
    let ffmpeg = Ffmpeg::new(&settings.tools.ffmpeg, &settings.tools.ffprobe)?;

    let orchestrator = Orchestrator::new(strategies, &cookies, AlreadyProcessed::default());
    let mut pipeline = Pipeline::new(orchestrator, &ffmpeg, settings.corrector, output_dir);

    let mut summary = Summary::default();
    for space in &spaces {
        let _span = info_span!("space", id = %space.id).entered();
        info!("Processing {space}");

        let res = pipeline.process(space);
        if let Err(err) = &res {
            error!("{err}");
        }
        summary.record(&res);
    }

    info!(
        "All tasks completed: {} saved, {} skipped, {} failed",
        summary.delivered, summary.skipped, summary.failed
    );

    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Collect the spaces from the direct links and the profiles.
///
/// Any error while searching the profiles stops the run.
fn find_spaces(args: &Args, settings: &Settings) -> miette::Result<Vec<Space>> {
    let links = resolve_links(&args.space);

    let found = if args.profile.is_empty() {
        Vec::new()
    } else {
        let api = XApi::new(&settings.api, args.access_token.as_deref())?;
        let found = search_profiles(
            &api,
            &args.profile,
            args.timeframe,
            OffsetDateTime::now_utc(),
        )?;

        selection::select(
            found,
            args.pick.as_deref(),
            args.interactive,
            std::io::stdin().lock(),
            std::io::stdout().lock(),
        )?
    };

    let spaces = merge_spaces(links, found);
    info!("{} spaces to download", spaces.len());
    Ok(spaces)
}

/// Load the downloaders in their order of preference, skipping the missing ones
fn load_downloaders(settings: &Settings) -> miette::Result<Vec<Box<dyn SpaceDownloader>>> {
    let timeout = Duration::from_secs(settings.tools.timeout_secs);
    let mut strategies: Vec<Box<dyn SpaceDownloader>> = Vec::with_capacity(2);

    match TwspaceDl::new(&settings.tools.primary, timeout) {
        Ok(dl) => strategies.push(Box::new(dl)),
        Err(err) => warn!("{} is not available: {err}", settings.tools.primary),
    }
    match Ytdl::new(&settings.tools.fallback, timeout) {
        Ok(dl) => strategies.push(Box::new(dl)),
        Err(err) => warn!("{} is not available: {err}", settings.tools.fallback),
    }

    if strategies.is_empty() {
        miette::bail!("No downloader is available");
    }
    Ok(strategies)
}
