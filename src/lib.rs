//! `bom-license-policy` — decide the usage policy (allow / deny / needs-review)
//! of license declarations found in a software bill of materials.
//!
//! # Flow
//! 1. Load a policy list ([`config::load_config`] or [`config::PolicyConfig`]).
//! 2. Build the [`policy::PolicyIndex`] once, on first use.
//! 3. Resolve each [`models::LicenseDeclaration`] through a
//!    [`policy::PolicyResolver`]; expressions are tokenized and parsed by
//!    [`license::expression`] and folded into one [`models::UsagePolicy`].
//!
//! ```
//! use bom_license_policy::config::PolicyConfig;
//! use bom_license_policy::models::{LicenseDeclaration, LicensePolicy, UsagePolicy};
//!
//! let config = PolicyConfig::new(vec![
//!     LicensePolicy::new(Some("Apache-2.0"), "Apache", UsagePolicy::Allow),
//!     LicensePolicy::new(Some("GPL-2.0-only"), "GPL", UsagePolicy::Deny),
//! ]);
//! let resolver = config.resolver()?;
//! let decl = LicenseDeclaration::ByExpression("Apache-2.0 AND GPL-2.0-only".into());
//! assert_eq!(resolver.resolve(&decl), UsagePolicy::Deny);
//! # Ok::<(), bom_license_policy::error::IndexBuildError>(())
//! ```

pub mod config;
pub mod error;
pub mod license;
pub mod models;
pub mod policy;
pub mod report;
