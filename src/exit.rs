//! Process exit codes carried by [`dispatch::CodedError`]

/// At least one host failed or was not attempted
pub const HOSTS_FAILED: u32 = 1;

/// The cluster file is missing or invalid
pub const CONFIG_INVALID: u32 = 3;

/// The dispatch engine itself failed (internal software error)
pub const ENGINE_FAULT: u32 = 70;
