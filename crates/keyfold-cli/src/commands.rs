use crate::cli::Commands;
use crate::utils::{build_runtime, format_snippet_table};
use keyfold_core::{
    add_snippet, delete_snippet, set_active, update_snippet, JsonStore, KeyfoldError,
    PlaceholderResolver, Result, Settings, Snippet, SnippetSource,
};
use keyfold_daemon::CaptureDaemon;
use keyfold_server::server::utils::port_is_available;
use keyfold_server::{ping_service, reload_service, MatchingService};
use std::sync::Arc;
use tracing::info;

pub fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { port } => handle_serve_command(port),
        Commands::Capture { port } => handle_capture_command(port),
        Commands::Ping { port } => handle_ping_command(port),
        Commands::Reload { port } => handle_reload_command(port),
        other => {
            let store = JsonStore::open_default();
            let message = handle_snippet_command(&store, other)?;
            println!("{}", message);
            Ok(())
        }
    }
}

/// Dictionary maintenance commands. Returns the text to show the user.
pub fn handle_snippet_command(source: &dyn SnippetSource, command: Commands) -> Result<String> {
    match command {
        Commands::Add {
            abbreviation,
            expansion,
            trigger,
            label,
        } => {
            let mut snippet = Snippet::new(abbreviation, expansion, trigger);
            if let Some(label) = label {
                snippet = snippet.with_label(label);
            }
            add_snippet(source, snippet).map(|_| "Snippet added successfully".to_string())
        }
        Commands::Update {
            abbreviation,
            expansion,
            trigger,
        } => update_snippet(source, &abbreviation, trigger, expansion)
            .map(|_| "Snippet updated successfully".to_string()),
        Commands::Delete {
            abbreviation,
            trigger,
        } => delete_snippet(source, &abbreviation, trigger)
            .map(|_| "Snippet deleted successfully".to_string()),
        Commands::Enable {
            abbreviation,
            trigger,
        } => set_active(source, &abbreviation, trigger, true)
            .map(|_| format!("Snippet '{}' enabled", abbreviation)),
        Commands::Disable {
            abbreviation,
            trigger,
        } => set_active(source, &abbreviation, trigger, false)
            .map(|_| format!("Snippet '{}' disabled", abbreviation)),
        Commands::List => {
            let snippets = source.load()?;
            if snippets.is_empty() {
                return Ok("No snippets defined yet. Add one with `keyfold add`.".to_string());
            }
            Ok(format_snippet_table(&snippets))
        }
        Commands::Serve { .. }
        | Commands::Capture { .. }
        | Commands::Ping { .. }
        | Commands::Reload { .. } => {
            Err(KeyfoldError::Other("not a snippet command".to_string()))
        }
    }
}

fn load_settings(port: Option<u16>) -> Result<Settings> {
    let mut settings = Settings::load()?;
    if let Some(port) = port {
        settings.port = port;
    }
    Ok(settings)
}

fn handle_serve_command(port: Option<u16>) -> Result<()> {
    let settings = load_settings(port)?;
    if !port_is_available(settings.port) {
        return Err(KeyfoldError::Other(format!(
            "port {} is already in use; is another matching service running?",
            settings.port
        )));
    }

    let source: Arc<dyn SnippetSource> = Arc::new(JsonStore::open_default());
    let service = MatchingService::from_settings(&settings, source, PlaceholderResolver::system())?;

    let runtime = build_runtime()?;

    // Block the current thread with the service
    runtime.block_on(async move {
        let listener = MatchingService::bind(settings.port).await?;
        Arc::new(service)
            .serve(listener, async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl+C, shutting down matching service");
                }
            })
            .await
    })
}

fn handle_capture_command(port: Option<u16>) -> Result<()> {
    let settings = load_settings(port)?;
    CaptureDaemon::system(settings).run_until_interrupted()
}

fn handle_ping_command(port: Option<u16>) -> Result<()> {
    let settings = load_settings(port)?;
    let runtime = build_runtime()?;
    let latency = runtime.block_on(ping_service(settings.port))?;
    println!(
        "Matching service on port {} is responsive ({} ms)",
        settings.port,
        latency.as_millis()
    );
    Ok(())
}

fn handle_reload_command(port: Option<u16>) -> Result<()> {
    let settings = load_settings(port)?;
    let runtime = build_runtime()?;
    let count = runtime.block_on(reload_service(settings.port))?;
    println!("Matching service reloaded {} snippets", count);
    Ok(())
}
