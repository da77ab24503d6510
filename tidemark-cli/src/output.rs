//! Terminal console for the tidemark commands.
//! Uses comfy-table for the status table, colored for styling and
//! tokio's stdin for the reset confirmation.

use async_trait::async_trait;
use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use tidemark_core::console::{Console, MigrationStatus, StatusRow};
use tidemark_core::error::Result;

/// Writes command output to stdout and reads answers from stdin.
///
/// Every line a handler emits is printed; for some commands an info line
/// such as "No migrations to run" is the whole result.
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Console for TerminalConsole {
    fn info(&mut self, message: &str) {
        println!("{}", message.bold());
    }

    fn success(&mut self, message: &str) {
        println!("{}", message.green());
    }

    fn table(&mut self, rows: &[StatusRow]) {
        print_status_table(rows);
    }

    async fn confirm(&mut self, question: &str) -> Result<bool> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{} {} ", question.yellow(), "[y/N]".dimmed()).as_bytes())
            .await?;
        stdout.flush().await?;

        let mut answer = String::new();
        let read = BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;
        if read == 0 {
            // EOF: nobody is there to agree.
            println!();
            return Ok(false);
        }
        Ok(is_affirmative(&answer))
    }
}

/// `y` or `yes`, any case.
fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Format migration status rows as a colored table.
pub fn print_status_table(rows: &[StatusRow]) {
    if rows.is_empty() {
        println!("{}", "No migrations found.".yellow());
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Migration"), Cell::new("Status")]);

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.migration),
            Cell::new(format_status(row.status)),
        ]);
    }

    println!("{table}");
}

fn format_status(status: MigrationStatus) -> String {
    match status {
        MigrationStatus::Completed => status.marker().green().to_string(),
        MigrationStatus::Pending => status.marker().red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative("YES\r\n"));
        assert!(is_affirmative("  Yes "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn test_format_status_keeps_marker() {
        colored::control::set_override(false);
        assert_eq!(format_status(MigrationStatus::Completed), "Y");
        assert_eq!(format_status(MigrationStatus::Pending), "N");
    }
}
