pub mod backup;
pub mod restore;

pub use backup::backup_command;
pub use restore::restore_command;
