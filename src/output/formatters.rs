//! Output Formatters Implementation
//!
//! Both formatters are pure functions of their input: no state, no I/O.

use crate::types::ExtractedItem;

/// Collapses `\r\n`, `\n` and `\r` to a single space each, so that item
/// content never breaks a line-oriented output format.
pub fn escape_text(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

/// Human-readable formatter.
///
/// ```text
/// === book.xlsx ===
/// [Sheet1:A1] Hello
/// [Sheet1:Shape] Note: Remember
/// ```
pub struct TerminalFormatter;

impl TerminalFormatter {
    /// Groups items by file path in order of first appearance. Groups are
    /// separated by a blank line.
    pub fn format(&self, items: &[ExtractedItem]) -> String {
        let mut groups: Vec<(&str, Vec<&ExtractedItem>)> = Vec::new();
        for item in items {
            match groups.iter_mut().find(|(path, _)| *path == item.file_path()) {
                Some((_, group)) => group.push(item),
                None => groups.push((item.file_path(), vec![item])),
            }
        }

        groups
            .into_iter()
            .map(|(path, group)| {
                let mut block = format!("=== {} ===\n", path);
                for item in group {
                    block.push_str(&format!(
                        "[{}:{}] {}\n",
                        item.sheet_name(),
                        item.address(),
                        escape_text(item.content())
                    ));
                }
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tab-separated formatter: `file path, sheet name, address, content`, one
/// item per line.
pub struct TsvFormatter;

impl TsvFormatter {
    pub fn format(&self, items: &[ExtractedItem]) -> String {
        items
            .iter()
            .map(|item| {
                format!(
                    "{}\t{}\t{}\t{}\n",
                    item.file_path(),
                    item.sheet_name(),
                    item.address(),
                    escape_text(item.content())
                )
            })
            .collect()
    }
}
