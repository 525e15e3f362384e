//! CLI exit code registry.
//!
//! Exit codes are part of the shell contract — import scripts branch on
//! them, so they never change meaning.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments; also clap's own code)    |
//! | 3    | Invalid config (TOML parse or validation failure)    |
//! | 4    | Runtime error (unreadable file, bad canonical data)  |
//! | 5    | Conflicts found (arbiter deactivated a claim)        |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Runtime failure: unreadable input, malformed canonical snapshot,
/// engine precondition violation.
pub const EXIT_RUNTIME: u8 = 4;

/// The run completed but the arbiter deactivated at least one conflicting
/// claim; drafts need review before applying.
pub const EXIT_CONFLICTS: u8 = 5;
