//! Exit status codes of the `mindbkp` binary.
//!
//! Values follow the BSD sysexits convention.
//! reference: [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&apropos=0&sektion=0&manpath=FreeBSD+11.2-stable&arch=default&format=html)

/// value: 0 <br>
/// Every selected application was either copied or skipped as unrecognized.
/// Warnings may have been logged.
pub const EX_OK: i32 = 0;

/// value: 73 <br>
/// The timestamped backup folder could not be created.
pub const EX_CANTCREAT: i32 = 73;

/// value: 74 <br>
/// The run completed, but at least one application failed to copy.
pub const EX_IOERR: i32 = 74;

/// value: 78 <br>
/// The signature document is missing or malformed at both the primary and the fallback location.
pub const EX_CONFIG: i32 = 78;
