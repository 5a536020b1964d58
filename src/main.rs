use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use taskmill_core::config::CONFIG_FILE_NAME;
use taskmill_core::{
    standard_registry, Cli, Config, Logger, NamespaceContext, Pipeline, ProcessExecutor,
    RunHistory, RunHistoryEntry, SystemToolchain, TargetRegistry, ValidatingExecutor,
};

fn init_config(root: &Path, logger: &Logger) -> Result<()> {
    let config_path = root.join(CONFIG_FILE_NAME);

    if config_path.exists() {
        anyhow::bail!(
            "{} already exists at {}. Remove it first if you want to reinitialize.",
            CONFIG_FILE_NAME,
            config_path.display()
        );
    }

    let mut config = Config::default();
    config.project.binary = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "app".to_string());
    config.default_target = Some("ci".to_string());

    config
        .save_to_file(&config_path)
        .with_context(|| format!("Failed to save {}", CONFIG_FILE_NAME))?;

    logger.success(&format!("Created {}", config_path.display()));
    Ok(())
}

fn list_targets(registry: &TargetRegistry) {
    let entries = registry.list();
    let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);

    println!("Targets:");
    let mut current_namespace = None;
    for entry in entries {
        let namespace = entry.name.split(':').next().unwrap_or_default().to_string();
        if current_namespace.as_ref() != Some(&namespace) {
            println!();
            current_namespace = Some(namespace);
        }
        if entry.aliases.is_empty() {
            println!("  {:<width$}  {}", entry.name, entry.description, width = width);
        } else {
            println!(
                "  {:<width$}  {} (alias: {})",
                entry.name,
                entry.description,
                entry.aliases.join(", "),
                width = width
            );
        }
    }
}

fn show_history(config: &Config, count: usize, logger: &Logger) -> Result<()> {
    let history = RunHistory::new(config.storage_path(), config.history.max_entries)
        .context("Failed to load history")?;

    if history.entries().is_empty() {
        logger.info("No run history found.");
        return Ok(());
    }

    let count = count.min(history.entries().len());
    logger.header(&format!("Run history (last {} entries)", count));

    for entry in history.recent(count) {
        let status = if entry.success { "✓" } else { "✗" };
        let git = match (&entry.git_branch, entry.short_commit()) {
            (Some(branch), Some(commit)) => format!(" | {}@{}", branch, commit),
            _ => String::new(),
        };
        println!(
            "{} {} | {} | {:.1}s{}",
            status,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.targets.join(" "),
            entry.duration,
            git
        );
        if let Some(failure) = &entry.failure {
            println!("    {}", failure);
        }
    }

    Ok(())
}

fn clear_history(config: &Config, logger: &Logger) -> Result<()> {
    let mut history = RunHistory::new(config.storage_path(), config.history.max_entries)
        .context("Failed to load history")?;
    let cleared = history.clear().context("Failed to clear history")?;
    logger.success(&format!("Cleared {} history entries", cleared));
    Ok(())
}

fn record_history(config: &Config, entry: RunHistoryEntry, logger: &Logger) {
    if !config.history.enabled {
        return;
    }

    let result = RunHistory::new(config.storage_path(), config.history.max_entries)
        .and_then(|mut history| history.add_entry(entry));

    if let Err(err) = result {
        logger.warn(&format!("Could not record run history: {:#}", err));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.project_root()?;
    let logger = Logger::new().with_verbose(cli.verbose);

    if cli.init {
        return init_config(&root, &logger);
    }

    let config = Config::load(&root, cli.config.as_deref())?;
    let verbose = cli.verbose || config.build.verbose;
    let logger = logger.with_verbose(verbose);

    if let Some(count) = cli.history {
        return show_history(&config, count, &logger);
    }

    if cli.clear_history {
        return clear_history(&config, &logger);
    }

    let config = Arc::new(config);
    let executor = ProcessExecutor::new(logger.clone())
        .with_verbose(verbose)
        .with_dry_run(cli.dry_run);
    let executor = ValidatingExecutor::new(Arc::new(executor));
    let ctx = NamespaceContext::new(
        config.clone(),
        root.clone(),
        Arc::new(executor),
        Arc::new(SystemToolchain::new()),
        logger.clone(),
    );
    let registry = standard_registry(&ctx)?;

    let targets = if cli.targets.is_empty() {
        match &config.default_target {
            Some(target) => vec![target.clone()],
            None => Vec::new(),
        }
    } else {
        cli.targets.clone()
    };

    if cli.list || targets.is_empty() {
        list_targets(&registry);
        return Ok(());
    }

    let resolved = registry.resolve_all(targets.as_slice())?;
    let pipeline = resolved
        .into_iter()
        .fold(
            Pipeline::new(targets.join(" "), "").with_logger(logger.clone()),
            |pipeline, (name, op)| pipeline.stage(name, op),
        );

    let start = Instant::now();
    let entry = RunHistoryEntry::new(targets, &root);

    match pipeline.execute().await {
        Ok(()) => {
            let elapsed = start.elapsed().as_secs_f64();
            logger.success(&format!("Done in {:.1}s", elapsed));
            if !cli.dry_run {
                record_history(&config, entry.succeeded(elapsed), &logger);
            }
            Ok(())
        }
        Err(err) => {
            let elapsed = start.elapsed().as_secs_f64();
            let code = err.exit_code();
            logger.error(&err.to_string());
            if !cli.dry_run {
                record_history(&config, entry.failed(elapsed, code, err.to_string()), &logger);
            }
            std::process::exit(code);
        }
    }
}
