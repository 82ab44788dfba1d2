pub mod metaimage;
pub mod workdir;

pub use workdir::{TempWorkspace, WorkingDirectory, WorkspaceProvider};
