//! Output Format Module
//!
//! Renders an ordered sequence of extracted items as text. The enum selects
//! one of the stateless formatters in [`formatters`].

mod formatters;

use std::io::{self, Write};

use crate::types::ExtractedItem;

pub use formatters::{escape_text, TerminalFormatter, TsvFormatter};

/// Output formatter (Strategy Pattern).
///
/// `Terminal` is meant for a human reading an interactive terminal, `Tsv`
/// for output that is redirected or piped into other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatter {
    Terminal,
    Tsv,
}

impl OutputFormatter {
    /// Picks `Terminal` when standard output is an interactive terminal.
    pub fn for_stdout(is_terminal: bool) -> Self {
        if is_terminal {
            OutputFormatter::Terminal
        } else {
            OutputFormatter::Tsv
        }
    }

    /// Formats `items` in their given order. Empty input gives an empty string.
    pub fn format(&self, items: &[ExtractedItem]) -> String {
        match self {
            OutputFormatter::Terminal => TerminalFormatter.format(items),
            OutputFormatter::Tsv => TsvFormatter.format(items),
        }
    }

    /// Writes the formatted items to `writer`.
    pub fn render<W: Write>(&self, items: &[ExtractedItem], writer: &mut W) -> io::Result<()> {
        let text = self.format(items);
        if !text.is_empty() {
            writer.write_all(text.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }
}
