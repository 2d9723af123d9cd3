//! CLI exit codes.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (storage, file codec)              |
//! | 2    | Usage error (bad args, unreadable script)        |
//! | 3    | No saved document matches the given name or key  |
//! | 4    | `apply --strict`: a command left the document unchanged |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - storage or codec failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable input.
pub const EXIT_USAGE: u8 = 2;

/// Document lookup failed.
pub const EXIT_NOT_FOUND: u8 = 3;

/// At least one scripted command was not applied.
pub const EXIT_REJECTED: u8 = 4;
