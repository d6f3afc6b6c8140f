//! graphvis-rs demo
//!
//! Builds a small graph, shows it through a threaded viewer, edits it while
//! the viewer runs and prints what the viewer ended up with.
//!
//! Usage: `graphvis-rs [settings.json|settings.toml]`

use anyhow::Context;
use graphvis_rs::{
    config::{LoggingConfig, Settings},
    graph::{Element, Graph},
    view::ThreadedDisplay,
    Value,
};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(
                dir.unwrap_or_else(|| std::path::Path::new(".")),
                name,
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

fn main() -> anyhow::Result<()> {
    let settings_path: PathBuf = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_path);
    let settings = Settings::load_or_default(&settings_path);

    // Keep the guard alive so buffered file logs are flushed on exit
    let _guard = init_logging(&settings.logging)?;
    tracing::info!("Starting graphvis-rs demo with settings from {:?}", settings_path);

    let graph = Graph::with_config("demo", &settings.graph);
    graph.set_attribute("ui.stylesheet", "node { fill-color: steelblue; }")?;
    for (id, x, y) in [("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 0.5, 1.0)] {
        graph.add_node(id)?.set_attribute("xy", Value::from([x, y]))?;
    }
    graph.add_edge("ab", "a", "b", false)?;
    graph.add_edge("bc", "b", "c", true)?;

    let display = ThreadedDisplay::new(settings.view.clone());
    let viewer = graph
        .display_with_layout(&display, false)
        .context("Failed to open the viewer")?;

    // Edits made while the viewer runs reach it through the pipe
    graph.step_begins(1.0)?;
    graph.add_node("d")?.set_attribute("xyz", Value::from([1.5, 1.0, 0.0]))?;
    graph.add_edge("cd", "c", "d", false)?;
    if let Some(edge) = graph.edge("ab") {
        edge.set_attribute("ui.label", "a-b")?;
        edge.set_attribute("ui.sprite.weight", 0.5)?;
    }
    graph.set_attribute("ui.sprite.weight.ui.label", "w")?;
    graph.remove_node("a")?;

    let snapshot = viewer.close()?;
    println!("{}", snapshot.to_json()?);

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Demo finished"
    );
    Ok(())
}
