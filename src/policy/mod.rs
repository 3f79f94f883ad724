//! License policy lookup and resolution.
//!
//! - [`index`] — the by-id / by-family tables built from a policy list.
//! - [`resolver`] — maps a [`LicenseDeclaration`](crate::models::LicenseDeclaration)
//!   to a [`UsagePolicy`](crate::models::UsagePolicy), evaluating expressions.

pub mod index;
pub mod resolver;

pub use index::PolicyIndex;
pub use resolver::{PolicyResolver, Resolution};
