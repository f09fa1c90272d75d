//! Splits raw `yandex-disk status` output into labelled fields.
//!
//! Typical input:
//!
//! ```text
//! Synchronization core status: busy
//! Sync progress: 65.34 MB/ 139.38 MB (46 %)
//! Path to Yandex.Disk directory: '/home/user/Yandex.Disk'
//!     Total: 43.50 GB
//!     Used: 2.89 GB
//!     Available: 40.61 GB
//!     Trash size: 0 B
//!
//! Last synchronized items:
//!     file: 'docs/report.ods'
//!     file: 'photo.jpg'
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Separates the labelled section from the list of recent items.
pub const ITEMS_MARKER: &str = "Last synchronized items:";

static ITEM_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*: '(.*)'\n").expect("item line pattern is valid"));

/// Fields of one status output, not yet normalized.
///
/// Labels missing from the output leave their field empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// `Synchronization core status`, verbatim.
    pub status: String,
    pub progress: String,
    pub total: String,
    pub used: String,
    /// `Available`
    pub free: String,
    pub trash: String,
    pub error: String,
    pub path: String,
    /// Recently synchronized paths in daemon order, duplicates kept.
    pub items: Vec<String>,
}

/// Parses one blob of daemon output. Empty input means the daemon is down.
pub fn parse(output: &str) -> ParsedOutput {
    let (head, items) = output.split_once(ITEMS_MARKER).unwrap_or((output, ""));

    let labels: HashMap<&str, &str> = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(label, value)| (label.trim(), value.trim()))
        .collect();
    let field = |label: &str| labels.get(label).copied().unwrap_or_default().to_owned();

    ParsedOutput {
        status: field("Synchronization core status"),
        progress: field("Sync progress"),
        total: field("Total"),
        used: field("Used"),
        free: field("Available"),
        trash: field("Trash size"),
        error: field("Error"),
        path: field("Path"),
        items: parse_items(items),
    }
}

fn parse_items(section: &str) -> Vec<String> {
    ITEM_LINE
        .captures_iter(section)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
        .collect()
}
