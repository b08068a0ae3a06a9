//! Test harness for ledger testing
//!
//! Throwaway engines and databases, plus a scripted peer transport for
//! consensus scenarios without sockets.

pub mod test_utils;

pub use test_utils::*;
