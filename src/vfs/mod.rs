//! Virtual filesystem
//!
//! Pure value model of a learner project and its editor tabs. Nothing in this
//! module performs I/O besides loading mission descriptors.

pub mod language;
pub mod mission;
pub mod state;

pub use language::Language;
pub use mission::{MissionDescriptor, MissionFile, ProjectSnapshot};
pub use state::{FileSystemState, VirtualFile, VirtualFolder};
