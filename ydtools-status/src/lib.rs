//! # ydtools-status
//!
//! Turns raw `yandex-disk status` text into a [`StatusSnapshot`].
//!
//! Everything here is pure: [`parse`] splits the text, [`normalize`] maps the
//! daemon status onto [`StatusKind`], and [`StatusSnapshot::apply`] folds the
//! result into the previous snapshot and reports a [`ChangeSet`].

pub mod normalize;
pub mod notice;
pub mod parser;
pub mod snapshot;

pub use normalize::normalize;
pub use notice::{notices, Notice};
pub use parser::{parse, ParsedOutput};
pub use snapshot::{ChangeSet, StatusKind, StatusSnapshot};
