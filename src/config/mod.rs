/// Configuration management
#[allow(clippy::module_inception)]
pub mod config;

pub use config::{
    Config, ScheduleConfig, SmtpConfig, SmtpSecurity, SourceConfig, StorageConfig,
    SNAPSHOT_FILE_NAME,
};
