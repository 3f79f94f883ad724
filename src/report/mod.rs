//! Report renderers for resolution results.
//!
//! - [`terminal`] — colored summary box and tables; respects `--verbose` / `--quiet`.

pub mod terminal;
