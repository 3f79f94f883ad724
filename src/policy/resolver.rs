use serde::Serialize;

use crate::error::ParseError;
use crate::license::expression::{parse, tokenize, ExprKind};
use crate::models::{LicenseDeclaration, UsagePolicy};
use crate::policy::index::PolicyIndex;

/// Substrings that mark a free-text name as a misplaced expression.
const OPERATOR_WORDS: [&str; 3] = ["AND", "OR", "WITH"];

/// Outcome of resolving one declaration in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub declaration: LicenseDeclaration,
    pub usage_policy: UsagePolicy,
    /// Parse failure that downgraded the declaration to `UNDEFINED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Maps license declarations to usage policies against one [`PolicyIndex`].
///
/// Every call is a pure function of the index and the declaration.
#[derive(Debug, Clone, Copy)]
pub struct PolicyResolver<'a> {
    index: &'a PolicyIndex,
}

impl<'a> PolicyResolver<'a> {
    pub fn new(index: &'a PolicyIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &'a PolicyIndex {
        self.index
    }

    /// Resolve a declaration; a malformed expression is logged and yields
    /// `Undefined`.
    pub fn resolve(&self, decl: &LicenseDeclaration) -> UsagePolicy {
        self.try_resolve(decl).unwrap_or_else(|e| {
            tracing::warn!(declaration = %decl, error = %e, "unparseable license expression");
            UsagePolicy::Undefined
        })
    }

    /// Resolve a declaration, surfacing expression parse failures.
    pub fn try_resolve(&self, decl: &LicenseDeclaration) -> Result<UsagePolicy, ParseError> {
        match decl {
            LicenseDeclaration::ById(id) => Ok(self.resolve_id(id)),
            LicenseDeclaration::ByName(name) => Ok(self.resolve_name(name)),
            LicenseDeclaration::ByExpression(expr) => self.resolve_expression(expr),
        }
    }

    /// Resolve every declaration; one bad expression never hides the rest.
    pub fn resolve_all<'d, I>(&self, decls: I) -> Vec<Resolution>
    where
        I: IntoIterator<Item = &'d LicenseDeclaration>,
    {
        decls
            .into_iter()
            .map(|decl| match self.try_resolve(decl) {
                Ok(usage_policy) => Resolution {
                    declaration: decl.clone(),
                    usage_policy,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(declaration = %decl, error = %e, "unparseable license expression");
                    Resolution {
                        declaration: decl.clone(),
                        usage_policy: UsagePolicy::Undefined,
                        error: Some(e.to_string()),
                    }
                }
            })
            .collect()
    }

    pub fn resolve_id(&self, id: &str) -> UsagePolicy {
        self.index
            .get_by_id(id)
            .map(|p| p.usage_policy)
            .unwrap_or(UsagePolicy::Undefined)
    }

    /// Resolve a free-text license name through the family keys it mentions.
    pub fn resolve_name(&self, name: &str) -> UsagePolicy {
        if OPERATOR_WORDS.iter().any(|op| name.contains(op)) {
            tracing::debug!(name, "license name looks like an expression");
            return UsagePolicy::Undefined;
        }
        match self.match_family(name) {
            Some(family) => self.family_policy(family),
            None => UsagePolicy::Undefined,
        }
    }

    /// The longest family key contained in `name`; ties go to the
    /// lexicographically smaller key.
    pub fn match_family(&self, name: &str) -> Option<&'a str> {
        self.index.families().find(|family| name.contains(family))
    }

    /// The policy shared by every member of `family`, or `Conflict` when the
    /// members disagree.
    pub fn family_policy(&self, family: &str) -> UsagePolicy {
        let mut members = self.index.get_by_family(family).iter();
        let Some(first) = members.next() else {
            return UsagePolicy::Undefined;
        };
        if members.all(|p| p.usage_policy == first.usage_policy) {
            first.usage_policy
        } else {
            UsagePolicy::Conflict
        }
    }

    pub fn resolve_expression(&self, expr: &str) -> Result<UsagePolicy, ParseError> {
        let root = parse(&tokenize(expr))?;
        if let ExprKind::Leaf { id, valid } = root.kind() {
            return Ok(if *valid {
                self.resolve_id(id)
            } else {
                UsagePolicy::Undefined
            });
        }
        Ok(root.evaluate(&|id: &str| self.resolve_id(id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LicensePolicy;
    use proptest::prelude::*;

    fn sample_index() -> PolicyIndex {
        let mut gpl = LicensePolicy::new(None, "GPL", UsagePolicy::Deny);
        gpl.children = vec!["GPL-2.0-only".into(), "GPL-3.0-only".into()];
        let policies = vec![
            LicensePolicy::new(Some("Apache-2.0"), "Apache", UsagePolicy::Allow),
            LicensePolicy::new(Some("MIT"), "MIT", UsagePolicy::Allow),
            LicensePolicy::new(Some("MPL-2.0"), "MPL", UsagePolicy::NeedsReview),
            gpl,
            LicensePolicy::new(Some("LGPL-2.1-only"), "LGPL", UsagePolicy::NeedsReview),
            LicensePolicy::new(Some("LGPL-3.0-only"), "LGPL", UsagePolicy::Deny),
        ];
        PolicyIndex::build(&policies, false).unwrap()
    }

    fn expr(s: &str) -> LicenseDeclaration {
        LicenseDeclaration::ByExpression(s.to_string())
    }

    #[test]
    fn test_resolve_by_id() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(resolver.resolve(&LicenseDeclaration::ById("MIT".into())), UsagePolicy::Allow);
        assert_eq!(
            resolver.resolve(&LicenseDeclaration::ById("GPL-3.0-only".into())),
            UsagePolicy::Deny
        );
    }

    #[test]
    fn test_missing_id_is_undefined() {
        let index = PolicyIndex::build(&[], false).unwrap();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(
            resolver.try_resolve(&LicenseDeclaration::ById("MIT".into())),
            Ok(UsagePolicy::Undefined)
        );
    }

    #[test]
    fn test_end_to_end_and_expression() {
        let policies = vec![
            LicensePolicy::new(Some("Apache-2.0"), "Apache", UsagePolicy::Allow),
            LicensePolicy::new(Some("GPL-2.0-only"), "GPL", UsagePolicy::Deny),
        ];
        let index = PolicyIndex::build(&policies, false).unwrap();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(
            resolver.resolve(&expr("Apache-2.0 AND GPL-2.0-only")),
            UsagePolicy::Deny
        );
    }

    #[test]
    fn test_or_keeps_most_restrictive() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(resolver.resolve(&expr("MIT OR Apache-2.0")), UsagePolicy::Allow);
        assert_eq!(resolver.resolve(&expr("MIT OR MPL-2.0")), UsagePolicy::NeedsReview);
        assert_eq!(resolver.resolve(&expr("MIT OR Unlisted-1.0")), UsagePolicy::Undefined);
        assert_eq!(
            resolver.resolve(&expr("(MIT OR MPL-2.0) AND GPL-3.0-only")),
            UsagePolicy::Deny
        );
    }

    #[test]
    fn test_with_clause_uses_base_license() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(
            resolver.resolve(&expr("GPL-2.0-only WITH Classpath-exception-2.0")),
            UsagePolicy::Deny
        );
        assert_eq!(
            resolver.resolve(&expr("Apache-2.0 WITH LLVM-exception")),
            UsagePolicy::Allow
        );
    }

    #[test]
    fn test_simple_expression_and_invalid_leaf() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(resolver.resolve(&expr(" MIT ")), UsagePolicy::Allow);
        assert_eq!(resolver.resolve(&expr("MIT+")), UsagePolicy::Undefined);
        assert_eq!(resolver.resolve(&expr("MIT AND MIT+")), UsagePolicy::Undefined);
    }

    #[test]
    fn test_malformed_expression_is_undefined() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        let decl = expr("MIT AND (Apache-2.0");
        assert_eq!(
            resolver.try_resolve(&decl),
            Err(ParseError::UnclosedParen { position: 2 })
        );
        assert_eq!(resolver.resolve(&decl), UsagePolicy::Undefined);
    }

    #[test]
    fn test_resolve_all_continues_after_parse_error() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        let decls = vec![
            expr("OR MIT"),
            LicenseDeclaration::ById("Apache-2.0".into()),
            expr("MIT AND GPL-2.0-only"),
        ];
        let results = resolver.resolve_all(&decls);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].usage_policy, UsagePolicy::Undefined);
        assert!(results[0].error.as_deref().unwrap().contains("`OR`"));
        assert_eq!(results[1].usage_policy, UsagePolicy::Allow);
        assert_eq!(results[1].error, None);
        assert_eq!(results[2].usage_policy, UsagePolicy::Deny);
    }

    #[test]
    fn test_long_flat_chain_is_undefined_not_a_crash() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        let chain = expr(&vec!["MIT"; 10_000].join(" AND "));
        assert!(matches!(
            resolver.try_resolve(&chain),
            Err(ParseError::TooLong { .. })
        ));

        let results = resolver.resolve_all(&[chain, LicenseDeclaration::ById("MIT".into())]);
        assert_eq!(results[0].usage_policy, UsagePolicy::Undefined);
        assert!(results[0].error.is_some());
        assert_eq!(results[1].usage_policy, UsagePolicy::Allow);
    }

    #[test]
    fn test_resolve_by_name() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        let name = |s: &str| LicenseDeclaration::ByName(s.to_string());

        assert_eq!(resolver.resolve(&name("The Apache Software License")), UsagePolicy::Allow);
        assert_eq!(resolver.resolve(&name("GNU GPL v2")), UsagePolicy::Deny);
        assert_eq!(resolver.resolve(&name("Some custom license")), UsagePolicy::Undefined);
    }

    #[test]
    fn test_name_with_operator_words_is_undefined() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        assert_eq!(
            resolver.resolve(&LicenseDeclaration::ByName("MIT OR Apache".into())),
            UsagePolicy::Undefined
        );
        assert_eq!(
            resolver.resolve(&LicenseDeclaration::ByName("GPL WITH exception".into())),
            UsagePolicy::Undefined
        );
    }

    #[test]
    fn test_name_matches_longest_family() {
        let index = sample_index();
        let resolver = PolicyResolver::new(&index);
        // "LGPL" contains "GPL"; the longer key wins
        assert_eq!(resolver.match_family("GNU LGPL v2.1"), Some("LGPL"));
        // LGPL members disagree
        assert_eq!(
            resolver.resolve(&LicenseDeclaration::ByName("GNU LGPL v2.1".into())),
            UsagePolicy::Conflict
        );
    }

    #[test]
    fn test_family_policy_unknown_family() {
        let index = sample_index();
        assert_eq!(PolicyResolver::new(&index).family_policy("Nope"), UsagePolicy::Undefined);
    }

    proptest! {
        #[test]
        fn prop_expression_resolution_is_deterministic(
            terms in proptest::collection::vec(
                "(MIT|Apache-2.0|MPL-2.0|GPL-2.0-only|LGPL-3.0-only|Unlisted-1.0)",
                1..6
            ),
            use_or in proptest::collection::vec(any::<bool>(), 6)
        ) {
            let mut text = terms[0].clone();
            for (i, term) in terms.iter().enumerate().skip(1) {
                text.push_str(if use_or[i] { " OR " } else { " AND " });
                text.push_str(term);
            }
            let index = sample_index();
            let resolver = PolicyResolver::new(&index);
            let first = resolver.resolve(&expr(&text));
            let second = resolver.resolve(&expr(&text));
            prop_assert_eq!(first, second);
        }
    }
}
