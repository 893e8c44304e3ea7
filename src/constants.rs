/// File name of the signature document, looked up in the application root
/// and, failing that, next to the executable.
pub const SIGNATURE_FILE_NAME: &str = "ApplicationSignatures.toml";
/// Name of the default destination folder, created next to the application root.
pub const DEFAULT_BACKUP_DIR_NAME: &str = "mindbkp";
/// Log file written to the working directory.
pub const LOG_FILE_NAME: &str = concat!(env!("CARGO_PKG_NAME"), ".log");
/// `chrono` format of the timestamp that starts every backup folder name.
pub const BACKUP_DIR_TIME_FORMAT: &str = "%Y-%m-%d_%H%M%S";
