//! Publishing: upload generated artifacts to hosting storage, with backup
//! before deploy and rollback after catastrophic deploy failure.

pub mod backup;
pub mod content_type;
pub mod deploy;

pub use backup::{backup_current_site, rollback_deployment};
pub use content_type::content_type_for;
pub use deploy::deploy_directory;
