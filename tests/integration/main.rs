//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives a subsystem through its
//! public API against a recording actor or the simulated brewery.  All
//! tests run on the host with no real hardware required.

mod brewery_tests;
mod mock_actor;
mod process_tests;
