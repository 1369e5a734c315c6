use keyfold_core::{Result, Snippet};
use tokio::runtime::Runtime;

const PREVIEW_WIDTH: usize = 40;

pub fn build_runtime() -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// First line of the expansion, shortened to fit a table cell.
pub fn preview(expansion: &str) -> String {
    let first_line = expansion.lines().next().unwrap_or("");
    let multiline = expansion.contains('\n');

    if first_line.chars().count() > PREVIEW_WIDTH {
        let cut: String = first_line.chars().take(PREVIEW_WIDTH - 3).collect();
        format!("{}...", cut)
    } else if multiline {
        format!("{} ...", first_line)
    } else {
        first_line.to_string()
    }
}

pub fn format_snippet_table(snippets: &[Snippet]) -> String {
    let abbr_width = snippets
        .iter()
        .map(|s| s.abbreviation.chars().count())
        .max()
        .unwrap_or(0)
        .max("ABBREVIATION".len());

    let mut out = format!(
        "{:<abbr_width$}  {:<7}  {:<6}  {:<9}  EXPANSION\n",
        "ABBREVIATION", "TRIGGER", "ACTIVE", "UPDATED"
    );

    for snippet in snippets {
        let mut expansion = preview(&snippet.expansion);
        if let Some(label) = &snippet.label {
            expansion = format!("{} ({})", expansion, label);
        }
        out.push_str(&format!(
            "{:<abbr_width$}  {:<7}  {:<6}  {:<9}  {}\n",
            snippet.abbreviation,
            snippet.trigger.to_string(),
            if snippet.is_active { "yes" } else { "no" },
            snippet.formatted_time(),
            expansion
        ));
    }

    out.trim_end().to_string()
}
