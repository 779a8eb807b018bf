//! Artifact files on disk
//!
//! - [`lister`]: finds the files of one kind and tracks which are done
//! - [`artifact`]: turns one file into records

pub mod artifact;
pub mod lister;

pub use artifact::{ArtifactFile, ParseContext};
pub use lister::{done_marker, yesterday_cutoff, FileLister, DONE_SUFFIX};
