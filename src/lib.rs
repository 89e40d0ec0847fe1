pub mod cli;
pub mod cluster;
pub mod data;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod history;
pub mod io_utils;
pub mod keys;
pub mod ops;
mod preview;
pub mod pseudonym;
pub mod recipe;
pub mod remap;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, ClusterArgs, Commands, InputArgs, OutputArgs, ReplayArgs, TransformArgs},
    cluster::ClusterRequest,
    dataset::Table,
    engine::Engine,
    history::History,
    recipe::Recipe,
    remap::ClusterSelection,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_refine", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Preview(args) => preview::execute(&args),
        Commands::Cluster(args) => handle_cluster(&args),
        Commands::Transform(args) => handle_transform(&args),
        Commands::Replay(args) => handle_replay(&args),
    }
}

/// Reads the input table; also returns the delimiter used so output can default to it.
pub(crate) fn load_input(args: &InputArgs) -> Result<(Table, u8)> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Reading '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let table = io_utils::read_table(&args.input, delimiter, encoding)
        .with_context(|| format!("Loading table from {:?}", args.input))?;
    Ok((table, delimiter))
}

fn write_output(table: &Table, args: &OutputArgs, input_delimiter: u8) -> Result<()> {
    let path = args.output.as_deref();
    let delimiter = io_utils::resolve_output_delimiter(path, args.output_delimiter, input_delimiter);
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    io_utils::write_table(table, path, delimiter, encoding)?;
    match path {
        Some(path) if !io_utils::is_dash(path) => info!(
            "Wrote {} row(s) x {} column(s) to {path:?}",
            table.len(),
            table.column_count()
        ),
        _ => debug!("Wrote {} row(s) to stdout", table.len()),
    }
    Ok(())
}

fn handle_cluster(args: &ClusterArgs) -> Result<()> {
    let (table, delimiter) = load_input(&args.source)?;
    let mut engine = Engine::new(table);
    let request = ClusterRequest {
        column: args.column.clone(),
        method: args.method,
        keying_function: args.keying,
        threshold: args.threshold,
        ngram_size: args.ngram_size,
    };
    let (clusters, _) = engine
        .propose_clusters(request)
        .with_context(|| format!("Clustering column '{}'", args.column))?;

    if !args.apply {
        print!("{}", table::render_clusters(&clusters));
        return Ok(());
    }
    for (idx, cluster) in clusters.iter().enumerate() {
        info!(
            "Merging cluster {idx} ({} value(s)) into '{}'",
            cluster.count,
            cluster.values.first().map(String::as_str).unwrap_or_default()
        );
    }
    engine
        .apply_cluster_merge(&ClusterSelection::all(clusters.len()))
        .context("Merging clusters")?;
    write_output(engine.current(), &args.target, delimiter)
}

fn handle_transform(args: &TransformArgs) -> Result<()> {
    let (table, delimiter) = load_input(&args.source)?;
    let recipe = Recipe::load(&args.recipe)?;
    let mut engine = Engine::new(table);
    recipe
        .run(&mut engine)
        .with_context(|| format!("Running recipe {:?}", args.recipe))?;
    for line in engine.history().listing() {
        info!("{line}");
    }
    write_output(engine.current(), &args.target, delimiter)?;
    if let Some(path) = &args.mapping {
        io_utils::write_json(engine.pseudonyms(), path)
            .with_context(|| format!("Writing pseudonym map to {path:?}"))?;
        info!("Pseudonym map written to {path:?}");
    }
    if let Some(path) = &args.history {
        engine.history().save(path)?;
        info!(
            "History of {} operation(s) written to {path:?}",
            engine.history().len()
        );
    }
    Ok(())
}

fn handle_replay(args: &ReplayArgs) -> Result<()> {
    let cursor = match args.cursor {
        None => None,
        Some(-1) => Some(None),
        Some(value) => match usize::try_from(value) {
            Ok(index) => Some(Some(index)),
            Err(_) => bail!("--cursor must be -1 or an operation index, got {value}"),
        },
    };
    let (table, delimiter) = load_input(&args.source)?;
    let mut history = History::load(&args.history)?;
    if let Some(cursor) = cursor {
        history.set_cursor(cursor)?;
    }
    debug!(
        "Replaying {} of {} operation(s)",
        history.applied().len(),
        history.len()
    );
    let engine = Engine::from_history(table, history)
        .with_context(|| format!("Replaying history {:?}", args.history))?;
    write_output(engine.current(), &args.target, delimiter)?;
    if let Some(path) = &args.mapping {
        io_utils::write_json(engine.pseudonyms(), path)
            .with_context(|| format!("Writing pseudonym map to {path:?}"))?;
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
