//! Platform-specific helpers.
//! Hides Unix/Windows differences for the few places that care about file
//! modes: the log file and the saved config document. Also names the hidden
//! temp siblings used for atomic writes.

#[cfg(unix)]
mod common_unix;
mod temp;
#[cfg(unix)]
mod unix;
#[cfg(not(unix))]
mod windows;

#[cfg(unix)]
pub use unix::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600, write_config_secure_0600,
};

#[cfg(not(unix))]
pub use windows::{
    open_log_file_secure_append, set_dir_mode_0700, set_file_mode_0600, write_config_secure_0600,
};

pub use temp::tmp_sibling_name;
