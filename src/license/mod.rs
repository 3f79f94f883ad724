//! License id syntax checks and SPDX expression parsing.
//!
//! - [`spdx`] — syntactic validation of SPDX ids and family keys.
//! - [`expression`] — tokenizer, recursive-descent parser and the
//!   [`CompoundExpression`](expression::CompoundExpression) tree it builds.

pub mod expression;
pub mod spdx;
