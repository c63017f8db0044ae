use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use guidfix_core::{FixerConfig, GuidFixer, PairOutcome, ScriptAssignment};
use guidfix_mapping::{
    discover, write_mapping_file, DelimitedFile, ManualSource, MappingPlan, MappingSource,
    StructuredFile,
};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

mod flags;
mod report;

use flags::ExtractFlag;
use report::{
    render_discovery, render_fix_summary, render_missing, FixReport, MissingOutcome,
};

const CONFIG_ENV: &str = "GUIDFIX_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "guidfix.toml";

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "guidfix")]
#[command(about = "Repair stale asset identifiers after moving folders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Config file (TOML or JSON). Falls back to $GUIDFIX_CONFIG, then ./guidfix.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remap identifiers from incorrect trees to correct ones and rewrite references
    Fix(FixArgs),

    /// Propose folder pairs by matching folder names
    Discover(DiscoverArgs),

    /// List script references whose identifier exists nowhere in the project
    Missing(MissingArgs),
}

#[derive(Args)]
struct FixArgs {
    /// `incorrect|correct` pairs file
    #[arg(long, conflicts_with = "mappings")]
    pairs: Option<PathBuf>,

    /// Saved mapping file (`unity_path` + `mappings`)
    #[arg(long)]
    mappings: Option<PathBuf>,

    /// Tree whose references are rewritten (overrides the mapping file)
    #[arg(long)]
    target: Option<PathBuf>,

    /// Fallback tree searched when a correct folder lacks a descriptor
    /// (overrides `source_path` in the mapping file)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Write through a temporary file and rename
    #[arg(long)]
    atomic: bool,

    /// Fail when two pairs remap one identifier differently
    #[arg(long)]
    strict_collisions: bool,

    /// Leave files under the incorrect trees untouched
    #[arg(long)]
    protect_incorrect: bool,

    /// Remove the incorrect trees after a successful rewrite
    #[arg(long)]
    delete_incorrect: bool,

    /// Identifier extraction strategy (overrides config)
    #[arg(long, value_enum)]
    extract: Option<ExtractFlag>,

    /// Output JSON report on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DiscoverArgs {
    /// Tree holding the correct folders (e.g. Library/PackageCache)
    #[arg(long)]
    source: PathBuf,

    /// Tree holding the stale copies
    #[arg(long)]
    old: PathBuf,

    /// Target tree stored in the saved mapping file
    #[arg(long)]
    target: Option<PathBuf>,

    /// Save the pairs as a mapping file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Output JSON report on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct MissingArgs {
    /// Project root (usually its Assets folder)
    project: PathBuf,

    /// Point a missing identifier at a script: `<ID>=<path/to/Script.cs>`.
    /// The project is rewritten with every assignment. Repeatable.
    #[arg(long = "assign", value_name = "ID=SCRIPT", value_parser = flags::parse_assignment)]
    assign: Vec<ScriptAssignment>,

    /// With --assign: report what would change without writing
    #[arg(long)]
    dry_run: bool,

    /// Identifier extraction strategy (overrides config)
    #[arg(long, value_enum)]
    extract: Option<ExtractFlag>,

    /// Output JSON report on stdout
    #[arg(long)]
    json: bool,
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();

    let json_output = match &cli.command {
        Commands::Fix(args) => args.json,
        Commands::Discover(args) => args.json,
        Commands::Missing(args) => args.json,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fix(args) => run_fix(args, config)?,
        Commands::Discover(args) => run_discover(args)?,
        Commands::Missing(args) => run_missing(args, config)?,
    }

    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<FixerConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|path| path.is_file())),
    };

    match path {
        Some(path) => FixerConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(FixerConfig::default()),
    }
}

fn load_plan(args: &FixArgs) -> Result<MappingPlan> {
    let from_file = match (&args.pairs, &args.mappings) {
        (Some(path), _) => Some(DelimitedFile::new(path).load()?),
        (None, Some(path)) => Some(StructuredFile::new(path).load()?),
        (None, None) => None,
    };

    match from_file {
        Some(plan) if !plan.is_empty() => Ok(plan),
        Some(plan) => {
            log::warn!("No usable pairs in the mapping file, switching to manual entry");
            let mut manual = read_manual()?;
            manual.rejected += plan.rejected;
            if manual.target.is_none() {
                manual.target = plan.target;
            }
            if manual.source.is_none() {
                manual.source = plan.source;
            }
            Ok(manual)
        }
        None => read_manual(),
    }
}

fn read_manual() -> Result<MappingPlan> {
    let stdin = io::stdin();
    ManualSource::new(stdin.lock(), io::stderr()).load()
}

fn run_fix(args: FixArgs, mut config: FixerConfig) -> Result<()> {
    if let Some(mode) = flags::write_mode(args.atomic) {
        config.write_mode = mode;
    }
    if let Some(policy) = flags::collision_policy(args.strict_collisions) {
        config.collision_policy = policy;
    }
    if let Some(strategy) = args.extract {
        config.extraction.strategy = strategy.as_domain();
    }
    let fixer = GuidFixer::new(config)?;

    let plan = load_plan(&args)?;
    let mut report = FixReport {
        pairs_rejected: plan.rejected,
        ..FixReport::default()
    };

    if plan.is_empty() {
        log::info!("No folder pairs given, nothing to do");
        return emit_fix(&args, &report);
    }

    let target = args
        .target
        .clone()
        .or(plan.target)
        .context("No target tree given (use --target or set unity_path in the mapping file)")?;
    if !target.is_dir() {
        anyhow::bail!("Target tree does not exist: {}", target.display());
    }
    report.target = Some(target.clone());
    report.source = args.source.clone().or(plan.source);

    report.aggregate = fixer.aggregate_with_fallback(&plan.pairs, report.source.as_deref())?;
    log::info!(
        "Global map holds {} remaps from {} pairs ({} skipped)",
        report.aggregate.map.len(),
        report.aggregate.processed_pairs(),
        report.aggregate.skipped_pairs()
    );

    if report.aggregate.map.is_empty() {
        log::info!("No identifiers need remapping, nothing to do");
        return emit_fix(&args, &report);
    }

    let mut options = fixer.rewrite_options();
    options.dry_run = args.dry_run;
    if args.protect_incorrect {
        options.excluded = plan.pairs.iter().map(|pair| pair.incorrect.clone()).collect();
    }
    let rewrite = fixer.rewrite(&target, &report.aggregate.map, options)?;
    log::info!(
        "Modified {} of {} files ({} replacements)",
        rewrite.files_modified,
        rewrite.files_scanned,
        rewrite.replacement_count
    );
    report.rewrite = Some(rewrite);

    if args.delete_incorrect {
        if args.dry_run {
            log::info!("Dry run: keeping incorrect trees");
        } else {
            report.deleted = delete_incorrect_trees(&report);
        }
    }

    emit_fix(&args, &report)
}

/// Remove the incorrect root of every processed pair. Failures are logged and
/// the remaining roots are still attempted.
fn delete_incorrect_trees(report: &FixReport) -> Vec<PathBuf> {
    let mut deleted = Vec::new();
    for outcome in &report.aggregate.outcomes {
        let PairOutcome::Processed { pair, .. } = outcome else {
            continue;
        };
        if deleted.contains(&pair.incorrect) {
            continue;
        }
        match fs::remove_dir_all(&pair.incorrect) {
            Ok(()) => {
                log::info!("Deleted {}", pair.incorrect.display());
                deleted.push(pair.incorrect.clone());
            }
            Err(err) => log::warn!("Failed to delete {}: {err}", pair.incorrect.display()),
        }
    }
    deleted
}

fn emit_fix(args: &FixArgs, report: &FixReport) -> Result<()> {
    if args.json {
        print_stdout(&serde_json::to_string_pretty(report)?)?;
    } else {
        eprint!("{}", render_fix_summary(report));
    }
    Ok(())
}

fn run_discover(args: DiscoverArgs) -> Result<()> {
    let report = discover(&args.source, &args.old)?;

    if let Some(save) = &args.save {
        let plan = MappingPlan {
            pairs: report.pairs.clone(),
            target: args.target.clone(),
            source: Some(args.source.clone()),
            rejected: 0,
        };
        write_mapping_file(save, &plan)?;
    }

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&report)?)?;
    } else {
        print_stdout(render_discovery(&report).trim_end())?;
    }
    Ok(())
}

fn run_missing(args: MissingArgs, mut config: FixerConfig) -> Result<()> {
    if let Some(strategy) = args.extract {
        config.extraction.strategy = strategy.as_domain();
    }
    let fixer = GuidFixer::new(config)?;
    let scan = fixer
        .scan_missing_scripts(&args.project)
        .with_context(|| format!("Failed to scan {}", args.project.display()))?;

    let mut outcome = MissingOutcome {
        scan,
        assigned: Default::default(),
        rewrite: None,
    };
    if !args.assign.is_empty() {
        for assignment in &args.assign {
            if !outcome.scan.missing.iter().any(|m| m.id == assignment.missing) {
                log::warn!("{} is not among the missing identifiers", assignment.missing);
            }
        }
        outcome.assigned = fixer.resolve_script_assignments(&args.assign)?;

        if outcome.assigned.is_empty() {
            log::info!("Assigned scripts already own their identifiers, nothing to do");
        } else {
            let mut options = fixer.rewrite_options();
            options.dry_run = args.dry_run;
            let rewrite = fixer.rewrite(&args.project, &outcome.assigned, options)?;
            log::info!(
                "Modified {} of {} files ({} replacements)",
                rewrite.files_modified,
                rewrite.files_scanned,
                rewrite.replacement_count
            );
            outcome.rewrite = Some(rewrite);
        }
    }

    if args.json {
        print_stdout(&serde_json::to_string_pretty(&outcome)?)?;
    } else {
        print_stdout(render_missing(&outcome).trim_end())?;
    }
    Ok(())
}
