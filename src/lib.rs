//! mindbkp: backs up the installed applications of a directory.
//!
//! Each top-level entry of the application root is matched against the
//! signature document. Recognized applications are copied into a fresh
//! timestamped folder, leaving out every file and folder their rules exclude.

pub mod backup_dir;
pub mod commands;
pub mod constants;
pub mod context;
pub mod copier;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod resolver;
pub mod selection;
pub mod signature;
pub mod sysexits;

pub use context::BackupContext;
pub use copier::{AppOutcome, RunSummary, copy_tree};
pub use resolver::{Resolution, resolve};
pub use signature::{SignatureDocument, load};
