//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the engine against mock
//! adapters. No serial device is required.

mod service_tests;
