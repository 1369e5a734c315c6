use crate::config::get_db_file_path;
use crate::error::{KeyfoldError, Result};
use crate::models::{Snippet, Trigger};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Keyed-record load/save facility the matching service reads snapshots from.
pub trait SnippetSource: Send + Sync {
    /// Load the dictionary in its stored order.
    fn load(&self) -> Result<Vec<Snippet>>;
    fn save(&self, snippets: &[Snippet]) -> Result<()>;
}

/// Snippet dictionary persisted as a pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location inside the config directory.
    pub fn open_default() -> Self {
        Self::new(get_db_file_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnippetSource for JsonStore {
    fn load(&self) -> Result<Vec<Snippet>> {
        if !self.path.exists() {
            debug!("No snippet database at {}, starting empty", self.path.display());
            return Ok(vec![]);
        }

        let content = fs::read_to_string(&self.path)?;

        // Handle empty database file
        if content.trim().is_empty() {
            return Ok(vec![]);
        }

        let snippets: Vec<Snippet> = serde_json::from_str(&content)?;
        validate_snippets(&snippets)?;
        info!(
            "Loaded {} snippets from {}",
            snippets.len(),
            self.path.display()
        );
        Ok(snippets)
    }

    fn save(&self, snippets: &[Snippet]) -> Result<()> {
        validate_snippets(snippets)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_string_pretty(snippets)?;
        fs::write(&self.path, serialized)?;
        debug!("Saved {} snippets to {}", snippets.len(), self.path.display());
        Ok(())
    }
}

/// Reject entries the matching engine cannot use.
pub fn validate_snippets(snippets: &[Snippet]) -> Result<()> {
    for snippet in snippets {
        if snippet.abbreviation.is_empty() {
            return Err(KeyfoldError::InvalidSnippet(format!(
                "snippet {} has an empty abbreviation",
                snippet.id
            )));
        }
    }
    Ok(())
}

/// Add a new snippet
pub fn add_snippet(source: &dyn SnippetSource, snippet: Snippet) -> Result<()> {
    let mut snippets = source.load()?;

    if snippets.iter().any(|existing| existing.same_identity(&snippet)) {
        return Err(KeyfoldError::InvalidSnippet(format!(
            "'{}' with trigger {} already exists",
            snippet.abbreviation, snippet.trigger
        )));
    }

    snippets.push(snippet);
    source.save(&snippets)
}

/// Delete a snippet by abbreviation and trigger
pub fn delete_snippet(source: &dyn SnippetSource, abbreviation: &str, trigger: Trigger) -> Result<()> {
    let mut snippets = source.load()?;
    let before = snippets.len();
    snippets.retain(|entry| !(entry.abbreviation == abbreviation && entry.trigger == trigger));

    if snippets.len() == before {
        return Err(KeyfoldError::SnippetNotFound(abbreviation.to_string()));
    }

    source.save(&snippets)
}

/// Update the expansion of an existing snippet
pub fn update_snippet(
    source: &dyn SnippetSource,
    abbreviation: &str,
    trigger: Trigger,
    expansion: String,
) -> Result<()> {
    modify_snippet(source, abbreviation, trigger, |entry| {
        entry.update_expansion(expansion.clone())
    })
}

/// Enable or disable a snippet without removing it
pub fn set_active(
    source: &dyn SnippetSource,
    abbreviation: &str,
    trigger: Trigger,
    active: bool,
) -> Result<()> {
    modify_snippet(source, abbreviation, trigger, |entry| entry.set_active(active))
}

fn modify_snippet<F>(source: &dyn SnippetSource, abbreviation: &str, trigger: Trigger, mut f: F) -> Result<()>
where
    F: FnMut(&mut Snippet),
{
    let mut snippets = source.load()?;
    let mut updated = false;

    for entry in snippets
        .iter_mut()
        .filter(|entry| entry.abbreviation == abbreviation && entry.trigger == trigger)
    {
        f(entry);
        updated = true;
    }

    if !updated {
        return Err(KeyfoldError::SnippetNotFound(abbreviation.to_string()));
    }

    source.save(&snippets)
}

/// Find the first active snippet with the given abbreviation
pub fn find_snippet<'a>(snippets: &'a [Snippet], abbreviation: &str) -> Option<&'a Snippet> {
    snippets
        .iter()
        .find(|entry| entry.is_active && entry.abbreviation == abbreviation)
}
