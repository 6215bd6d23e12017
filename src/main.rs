use std::{
    io::{self, IsTerminal},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use modsync::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "modsync")]
#[command(
    about = "Check a Minecraft instance's mods against Modrinth and download updates",
    long_about = None
)]
struct Cli {
    /// Search Modrinth for a mod's slug and exit
    #[arg(short, long, value_name = "QUERY")]
    search: Option<String>,

    /// Number of search results to show
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Instance to check, prompts if missing or unknown
    #[arg(short, long)]
    instance: Option<String>,

    /// Game version to look for instead of the instance's
    #[arg(short = 'v', long = "version", value_name = "GAME_VERSION")]
    game_version: Option<String>,

    /// Mod loader to look for instead of the instance's
    #[arg(short, long)]
    loader: Option<String>,

    /// Config file to use
    #[arg(short, long, env = "MODSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Download updates without asking
    #[arg(short, long, conflicts_with = "no_download")]
    yes: bool,

    /// Only report, never download
    #[arg(short, long)]
    no_download: bool,

    /// Add mods to the config by slug and exit
    #[arg(short, long, num_args = 1.., value_name = "SLUG", conflicts_with = "search")]
    add: Vec<String>,

    /// Add unmanaged mods that can be found on Modrinth to the config
    #[arg(long)]
    adopt: bool,

    /// Show debug logging
    #[arg(short, long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("modsync=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modsync=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let api = Modrinth::default();

    if let Some(query) = &cli.search {
        let res = api
            .search(query, cli.limit)
            .with_context(|| format!("Searching Modrinth for '{query}'"))?;
        println!("{res}");
        return Ok(());
    }

    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => default_config_path()?,
    };
    debug!("Using config {}", config_path.display());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Loading config from {}", config_path.display()))?;

    if !cli.add.is_empty() {
        let tracked = add_verified(&api, &mut config, &cli.add);
        print_tracked(&tracked);
        if !tracked.added.is_empty() {
            config.save()?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let name = select_instance(&config, cli.instance.as_deref(), stdin.lock(), io::stdout())?;
    let overrides = Overrides {
        game_version: cli.game_version.clone(),
        loader: cli.loader.clone(),
    };
    let instance = config.resolve(&name, &overrides)?;

    println!("{}", lookup_banner(&instance));
    let local = find_mods(&instance.mods_dir)?;
    let reports = check(&api, &instance, &config.mods, &local);

    for report in &reports {
        if let Some(latest) = &report.latest {
            println!(
                "Latest download for {}: {} ({})",
                report.slug,
                latest.filename,
                latest.file_size_string()
            );
        }
    }
    for (slug, current) in get_current_mods(&config.mods, &local) {
        println!("Current {slug}: {current}");
    }
    for report in &reports {
        println!("{report}");
    }

    let unmanaged = find_unmanaged(&config.mods, &local);
    if !unmanaged.is_empty() {
        println!("Unmanaged mods:");
        for m in &unmanaged {
            println!("  {m}");
        }
    }

    if cli.adopt && !unmanaged.is_empty() {
        let tracked = adopt(&api, &mut config, &unmanaged);
        print_tracked(&tracked);
        if !tracked.added.is_empty() {
            config.save()?;
        }
    }

    let outdated = get_outdated(&reports);
    if outdated.is_empty() {
        println!("Everything is up to date");
        return Ok(());
    }
    if cli.no_download {
        return Ok(());
    }

    let question = format!(
        "Download {} file(s) into {}?",
        outdated.len(),
        instance.mods_dir.display()
    );
    if !cli.yes && !confirm(stdin.lock(), io::stdout(), question)? {
        return Ok(());
    }

    let outcomes = download_all(&api, &outdated, &instance);
    for outcome in &outcomes {
        println!("{outcome}");
    }
    if outcomes.iter().any(|o| !o.is_installed()) {
        anyhow::bail!("Some mods failed to update");
    }

    Ok(())
}

fn lookup_banner(instance: &ResolvedInstance) -> String {
    format!("Getting mod info from Modrinth... Instance: {}", instance.name)
}

fn download_all(
    api: &Modrinth,
    outdated: &[&ModReport],
    instance: &ResolvedInstance,
) -> Vec<UpdateOutcome> {
    let style = ProgressStyle::default_bar()
        .template("{msg} {wide_bar} {bytes}/{total_bytes}")
        .map(|s| s.progress_chars("->."))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let show = io::stderr().is_terminal();

    let mut bar: Option<(String, ProgressBar)> = None;
    let outcomes = update(api, outdated, instance, |report, delta, _, total| {
        if !show {
            return;
        }
        let slug = &report.slug;
        if bar.as_ref().map_or(true, |(s, _)| s != slug) {
            if let Some((_, pb)) = bar.take() {
                pb.finish();
            }
            let pb = ProgressBar::new(total)
                .with_style(style.clone())
                .with_message(format!("Downloading {slug}"));
            bar = Some((slug.clone(), pb));
        }
        if let Some((_, pb)) = &bar {
            pb.set_length(total);
            pb.inc(delta);
        }
    });
    if let Some((_, pb)) = bar {
        pb.finish();
    }

    outcomes
}

fn print_tracked(tracked: &modsync::core::adopt::Tracked) {
    for slug in &tracked.added {
        println!("Added {slug} to the config");
    }
    for (name, reason) in &tracked.rejected {
        println!("Skipped {name}: {reason}");
    }
}
