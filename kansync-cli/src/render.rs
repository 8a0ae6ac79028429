//! Terminal rendering for kansync types.
//!
//! Extension traits that add colored terminal rendering to core types
//! using owo_colors.

use kansync_core::{CardView, Change, ChangeKind, RowView};
use owo_colors::OwoColorize;

/// Extension trait for terminal rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for ChangeKind {
    fn render(&self) -> String {
        let symbol = self.symbol();
        match self {
            ChangeKind::Added => symbol.green().to_string(),
            ChangeKind::Removed => symbol.red().to_string(),
            ChangeKind::Modified => symbol.yellow().to_string(),
        }
    }
}

impl Render for Change {
    fn render(&self) -> String {
        // Rows carry a title, cards a text; show whichever is there.
        let label = self
            .doc
            .str_field("title")
            .or_else(|| self.doc.str_field("text"))
            .unwrap_or(&self.doc.id);
        format!("{} {} {}", self.kind.render(), label, self.doc.id.dimmed())
    }
}

impl Render for RowView {
    fn render(&self) -> String {
        format!("── {}", self.title.bold())
    }
}

impl Render for CardView {
    fn render(&self) -> String {
        let mut line = format!("   • {}", self.text);
        for label in &self.labels {
            line.push_str(&format!(" {}", format!("[{}]", label).cyan()));
        }
        if !self.body.is_empty() {
            line.push_str(&format!("\n     {}", self.body.dimmed()));
        }
        line
    }
}
