//! CLI subcommand handlers.

use crate::table::TablePresenter;
use crate::{Commands, ConfigAction, StoreAction, demo};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use undetermini_core::{
    Cost, JsonResultStore, ResultStore, RunRequest, StoreOptions, Undetermini, UndeterminiConfig,
};

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Demo {
            times,
            use_cache,
            persist,
            store,
        } => handle_demo(workspace, times, use_cache, persist, store).await,
        Commands::Store { action } => handle_store(action, workspace).await,
        Commands::Config { action } => handle_config(action, workspace).await,
    }
}

fn load(workspace: &Path) -> anyhow::Result<UndeterminiConfig> {
    undetermini_core::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

async fn handle_demo(
    workspace: &Path,
    times: Option<usize>,
    use_cache: bool,
    persist: bool,
    store: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    if let Some(times) = times {
        config.run.times = times;
    }
    if use_cache {
        config.run.use_cache = true;
    }
    if persist {
        config.store.persist_on_disk = true;
    }
    if let Some(path) = store {
        config.store.path = path;
    }

    let store_options = config.store_options(Some(workspace));
    info!(
        persist = store_options.persist_on_disk,
        path = ?store_options.path,
        "Opening result store"
    );
    let engine = Undetermini::create(store_options)
        .await?
        .with_settings(config.engine_settings())
        .with_throttle(config.throttle.clone());

    let implementations = demo::factory()?.implementations();
    println!(
        "Benchmarking {} implementations, {} run(s) each...",
        implementations.len(),
        config.run.times
    );

    let presenter = Arc::new(TablePresenter::new(config.presenter.enabled));
    let rows = engine
        .run(
            RunRequest::new(demo::input(), implementations)
                .times(config.run.times)
                .use_cache(config.run.use_cache)
                .expected_output(demo::expected_output())
                .presenter(presenter),
        )
        .await?;

    let spent: Cost = rows.iter().map(|r| r.results_current_price).sum();
    let fresh: usize = rows.iter().map(|r| r.real_call_count).sum();
    println!("{fresh} fresh call(s), {spent} cents spent on this run.");
    Ok(())
}

/// Open the configured store file for inspection.
async fn open_store(workspace: &Path) -> anyhow::Result<JsonResultStore> {
    let config = load(workspace)?;
    let path = config.resolved_store_path(Some(workspace));
    if !path.exists() {
        anyhow::bail!("No result store at {}", path.display());
    }
    Ok(JsonResultStore::create(StoreOptions::on_disk(path)).await?)
}

async fn handle_store(action: StoreAction, workspace: &Path) -> anyhow::Result<()> {
    let store = open_store(workspace).await?;
    match action {
        StoreAction::Stats => {
            let records = store.all().await;
            let run_ids: HashSet<&str> = records.iter().map(|r| r.run_id.as_str()).collect();
            let implementations: HashSet<&str> =
                records.iter().map(|r| r.implementation_id.as_str()).collect();
            let errors = records.iter().filter(|r| r.is_error()).count();
            let total: Cost = records.iter().map(|r| r.cost).sum();

            if let Some(path) = store.path() {
                println!("Store: {}", path.display());
            }
            println!("  Records:         {}", records.len());
            println!("  Run ids:         {}", run_ids.len());
            println!("  Implementations: {}", implementations.len());
            println!("  Errors:          {}", errors);
            println!("  Total cost:      {} cents", total);
            if let Some(latest) = records.iter().map(|r| r.runned_at).max() {
                println!("  Last run:        {}", latest.to_rfc3339());
            }
            Ok(())
        }
        StoreAction::Show { run_id, limit } => {
            let records = store.get_last_run_results(&run_id, limit).await?;
            if records.is_empty() {
                println!("No records for run id {}", run_id);
                return Ok(());
            }
            for record in &records {
                println!("{}", serde_json::to_string_pretty(record)?);
            }
            Ok(())
        }
    }
}

async fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".undetermini");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&UndeterminiConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
