use clap::{Parser, Subcommand};
use keyfold_core::Trigger;

#[derive(Parser)]
#[command(
    author = "bahdotsh",
    version = env!("CARGO_PKG_VERSION"),
    about = "keyfold - system-wide text expansion",
    long_about = "keyfold watches what you type and replaces abbreviations with their expansions in any application."
)]
pub struct Keyfold {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new snippet
    Add {
        #[clap(long, short = 'a', help = "Abbreviation that triggers the snippet")]
        abbreviation: String,

        #[clap(long, short = 'e', help = "Expansion template")]
        expansion: String,

        #[clap(long, short = 't', default_value = "none", help = "Trigger: space, enter or none")]
        trigger: Trigger,

        #[clap(long, short = 'l', help = "Optional description")]
        label: Option<String>,
    },
    /// Update the expansion of an existing snippet
    Update {
        #[clap(long, short = 'a', help = "Abbreviation of the snippet to update")]
        abbreviation: String,

        #[clap(long, short = 'e', help = "New expansion template")]
        expansion: String,

        #[clap(long, short = 't', default_value = "none", help = "Trigger of the snippet")]
        trigger: Trigger,
    },
    /// Delete a snippet
    Delete {
        #[clap(long, short = 'a', help = "Abbreviation of the snippet to delete")]
        abbreviation: String,

        #[clap(long, short = 't', default_value = "none", help = "Trigger of the snippet")]
        trigger: Trigger,
    },
    /// Re-enable a disabled snippet
    Enable {
        #[clap(long, short = 'a')]
        abbreviation: String,

        #[clap(long, short = 't', default_value = "none")]
        trigger: Trigger,
    },
    /// Keep a snippet but stop it from expanding
    Disable {
        #[clap(long, short = 'a')]
        abbreviation: String,

        #[clap(long, short = 't', default_value = "none")]
        trigger: Trigger,
    },
    /// List all snippets
    List,
    /// Run the matching service in the foreground
    Serve {
        #[clap(long, short, help = "Port to listen on (defaults to settings)")]
        port: Option<u16>,
    },
    /// Run the capture daemon in the foreground
    Capture {
        #[clap(long, short, help = "Port of the matching service (defaults to settings)")]
        port: Option<u16>,
    },
    /// Check that the matching service is responsive
    Ping {
        #[clap(long, short)]
        port: Option<u16>,
    },
    /// Ask a running matching service to reload snippets from disk
    Reload {
        #[clap(long, short)]
        port: Option<u16>,
    },
}
