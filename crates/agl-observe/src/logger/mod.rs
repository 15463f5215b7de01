mod config;
mod error;
mod format;
mod log;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use log::BoxedLayer;

pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    logger_init_with(cfg, None)
}

/// Initialize the global logger with one extra layer installed beside the
/// formatter. The level filter applies to the formatter only.
pub fn logger_init_with(cfg: &LoggerConfig, extra: Option<BoxedLayer>) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg, extra),
        LoggerFormat::Json => log::Logger::json(cfg, extra),
        LoggerFormat::Journald => log::Logger::journald(cfg, extra),
    }
}
