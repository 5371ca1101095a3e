mod file;

pub use file::{File, FileContent, FileLimits, FileState, NewFile};
