//! SPDX license expression tokenizer and parser.
//!
//! Grammar (`WITH` binds tightest, then `AND`, then `OR`):
//! ```text
//! expr     := or_term
//! or_term  := and_term ( "OR" and_term )*
//! and_term := unary ( "AND" unary )*
//! unary    := id ( "WITH" exception_id )? | "(" expr ")"
//! ```
//! Operators are matched case-sensitively; `and` is an ordinary id token.

use once_cell::unsync::OnceCell;

use crate::error::ParseError;
use crate::license::spdx::is_valid_spdx_id;
use crate::models::UsagePolicy;

/// Maximum nesting of parentheses before the parser gives up.
pub const MAX_DEPTH: usize = 64;

/// Maximum number of `AND`/`OR` operators in one expression. Together with
/// [`MAX_DEPTH`] this bounds the depth of the tree that `evaluate`, `Display`
/// and `Drop` recurse through.
pub const MAX_OPERATORS: usize = 256;

const AND: &str = "AND";
const OR: &str = "OR";
const WITH: &str = "WITH";
const OPEN: &str = "(";
const CLOSE: &str = ")";

/// Split an expression into tokens.
///
/// Any whitespace separates tokens and parentheses always form their own
/// token. Token text is kept verbatim.
pub fn tokenize(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' || c == ')' {
            tokens.push(c.to_string());
            chars.next();
        } else {
            let mut s = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            tokens.push(s);
        }
    }
    tokens
}

/// Node of a parsed license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    /// A single license id. `valid` records whether it passed SPDX id syntax.
    Leaf { id: String, valid: bool },
    And(Box<CompoundExpression>, Box<CompoundExpression>),
    Or(Box<CompoundExpression>, Box<CompoundExpression>),
    With {
        license: Box<CompoundExpression>,
        exception: String,
    },
}

/// Expression tree with a per-node memoized usage policy.
///
/// Trees are built for one evaluation and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundExpression {
    kind: ExprKind,
    policy: OnceCell<UsagePolicy>,
}

impl CompoundExpression {
    fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            policy: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// True only for a bare license id.
    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ExprKind::Leaf { .. })
    }

    /// Policy computed by a previous [`evaluate`](Self::evaluate), if any.
    pub fn policy(&self) -> Option<UsagePolicy> {
        self.policy.get().copied()
    }

    /// Ids in the tree that failed SPDX id syntax, left to right.
    pub fn invalid_ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_invalid(&mut out);
        out
    }

    fn collect_invalid<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            ExprKind::Leaf { id, valid } => {
                if !valid {
                    out.push(id);
                }
            }
            ExprKind::And(l, r) | ExprKind::Or(l, r) => {
                l.collect_invalid(out);
                r.collect_invalid(out);
            }
            ExprKind::With { license, .. } => license.collect_invalid(out),
        }
    }

    /// Fold the tree bottom-up into one usage policy.
    ///
    /// `leaf` resolves a single, syntactically valid id. Invalid ids resolve to
    /// `Undefined`, a `WITH` clause takes its license's policy, and `AND`/`OR`
    /// both keep the more restrictive operand.
    pub fn evaluate<F>(&self, leaf: &F) -> UsagePolicy
    where
        F: Fn(&str) -> UsagePolicy,
    {
        *self.policy.get_or_init(|| match &self.kind {
            ExprKind::Leaf { id, valid: true } => leaf(id),
            ExprKind::Leaf { valid: false, .. } => UsagePolicy::Undefined,
            ExprKind::With { license, .. } => license.evaluate(leaf),
            ExprKind::And(l, r) | ExprKind::Or(l, r) => {
                l.evaluate(leaf).most_restrictive(r.evaluate(leaf))
            }
        })
    }

    fn fmt_operand(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        parent_is_and: bool,
    ) -> std::fmt::Result {
        if parent_is_and && matches!(self.kind, ExprKind::Or(..)) {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl std::fmt::Display for CompoundExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExprKind::Leaf { id, .. } => write!(f, "{id}"),
            ExprKind::With { license, exception } => {
                if license.is_simple() {
                    write!(f, "{license} WITH {exception}")
                } else {
                    write!(f, "({license}) WITH {exception}")
                }
            }
            ExprKind::And(l, r) => {
                l.fmt_operand(f, true)?;
                write!(f, " AND ")?;
                r.fmt_operand(f, true)
            }
            ExprKind::Or(l, r) => {
                l.fmt_operand(f, false)?;
                write!(f, " OR ")?;
                r.fmt_operand(f, false)
            }
        }
    }
}

/// Parse a token sequence produced by [`tokenize`].
pub fn parse(tokens: &[String]) -> Result<CompoundExpression, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = ExprParser {
        tokens,
        pos: 0,
        depth: 0,
        operators: 0,
    };
    let root = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            token: token.to_string(),
            position: parser.pos,
        });
    }
    Ok(root)
}

/// Tokenize and parse in one step.
pub fn parse_expression(expr: &str) -> Result<CompoundExpression, ParseError> {
    parse(&tokenize(expr))
}

fn is_reserved(token: &str) -> bool {
    matches!(token, AND | OR | WITH | OPEN | CLOSE)
}

/// Single-cursor recursive descent parser.
struct ExprParser<'t> {
    tokens: &'t [String],
    pos: usize,
    depth: usize,
    operators: usize,
}

impl<'t> ExprParser<'t> {
    fn peek(&self) -> Option<&'t str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn consume(&mut self) -> Option<&'t str> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Consume a binary operator, failing once the expression holds more than
    /// [`MAX_OPERATORS`] of them.
    fn consume_operator(&mut self) -> Result<(), ParseError> {
        self.operators += 1;
        if self.operators > MAX_OPERATORS {
            return Err(ParseError::TooLong {
                position: self.pos,
                limit: MAX_OPERATORS,
            });
        }
        self.consume();
        Ok(())
    }

    fn unexpected(&self, token: &str) -> ParseError {
        ParseError::UnexpectedToken {
            token: token.to_string(),
            position: self.pos,
        }
    }

    /// Parse an OR-level expression (lowest precedence).
    fn parse_or(&mut self) -> Result<CompoundExpression, ParseError> {
        let mut result = self.parse_and()?;
        while self.peek() == Some(OR) {
            self.consume_operator()?;
            let rhs = self.parse_and()?;
            result = CompoundExpression::new(ExprKind::Or(Box::new(result), Box::new(rhs)));
        }
        Ok(result)
    }

    /// Parse an AND-level expression (higher precedence than OR).
    fn parse_and(&mut self) -> Result<CompoundExpression, ParseError> {
        let mut result = self.parse_unary()?;
        while self.peek() == Some(AND) {
            self.consume_operator()?;
            let rhs = self.parse_unary()?;
            result = CompoundExpression::new(ExprKind::And(Box::new(result), Box::new(rhs)));
        }
        Ok(result)
    }

    /// Parse a parenthesised sub-expression or an id with an optional `WITH`.
    fn parse_unary(&mut self) -> Result<CompoundExpression, ParseError> {
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd { position: self.pos }),
            Some(OPEN) => self.parse_group(),
            Some(token) if is_reserved(token) => Err(self.unexpected(token)),
            Some(id) => {
                self.consume();
                let valid = is_valid_spdx_id(id);
                if !valid {
                    tracing::debug!(id, position = self.pos - 1, "license id fails SPDX syntax");
                }
                let leaf = CompoundExpression::new(ExprKind::Leaf {
                    id: id.to_string(),
                    valid,
                });

                if self.peek() != Some(WITH) {
                    return Ok(leaf);
                }
                self.consume();
                match self.peek() {
                    None => Err(ParseError::UnexpectedEnd { position: self.pos }),
                    Some(token) if is_reserved(token) => Err(self.unexpected(token)),
                    Some(exception) => {
                        self.consume();
                        Ok(CompoundExpression::new(ExprKind::With {
                            license: Box::new(leaf),
                            exception: exception.to_string(),
                        }))
                    }
                }
            }
        }
    }

    fn parse_group(&mut self) -> Result<CompoundExpression, ParseError> {
        let open = self.pos;
        self.consume();
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep {
                position: open,
                limit: MAX_DEPTH,
            });
        }

        let inner = self.parse_or()?;
        match self.peek() {
            Some(CLOSE) => {
                self.consume();
                self.depth -= 1;
                Ok(inner)
            }
            Some(token) => Err(self.unexpected(token)),
            None => Err(ParseError::UnclosedParen { position: open }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn toks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_whitespace_and_parens() {
        assert_eq!(
            tokenize(" Apache-2.0\tAND (\tMIT OR GPL-2.0-only )\n"),
            toks(&["Apache-2.0", "AND", "(", "MIT", "OR", "GPL-2.0-only", ")"])
        );
    }

    #[test]
    fn test_tokenize_tight_parens() {
        assert_eq!(
            tokenize("(MIT)AND(ISC)"),
            toks(&["(", "MIT", ")", "AND", "(", "ISC", ")"])
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \t\n").is_empty());
    }

    #[test]
    fn test_tokenize_preserves_case() {
        assert_eq!(tokenize("mit and isc"), toks(&["mit", "and", "isc"]));
    }

    #[test]
    fn test_parse_simple() {
        let root = parse_expression("MIT").unwrap();
        assert!(root.is_simple());
        assert_eq!(
            root.kind(),
            &ExprKind::Leaf {
                id: "MIT".into(),
                valid: true
            }
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let root = parse_expression("MIT OR GPL-3.0-only AND BSD-3-Clause").unwrap();
        match root.kind() {
            ExprKind::Or(l, r) => {
                assert!(l.is_simple());
                assert!(matches!(r.kind(), ExprKind::And(..)));
            }
            other => panic!("expected OR at the root, got {other:?}"),
        }
        assert_eq!(root.to_string(), "MIT OR GPL-3.0-only AND BSD-3-Clause");
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let root = parse_expression("(MIT OR GPL-3.0-only) AND BSD-3-Clause").unwrap();
        assert!(matches!(root.kind(), ExprKind::And(..)));
        assert_eq!(root.to_string(), "(MIT OR GPL-3.0-only) AND BSD-3-Clause");
    }

    #[test]
    fn test_with_binds_tightest() {
        let root = parse_expression("GPL-2.0-only WITH Classpath-exception-2.0 OR MIT").unwrap();
        match root.kind() {
            ExprKind::Or(l, _) => match l.kind() {
                ExprKind::With { license, exception } => {
                    assert!(license.is_simple());
                    assert_eq!(exception, "Classpath-exception-2.0");
                }
                other => panic!("expected WITH, got {other:?}"),
            },
            other => panic!("expected OR at the root, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_id_is_recorded_not_rejected() {
        let root = parse_expression("MIT AND Foo+Bar").unwrap();
        assert_eq!(root.invalid_ids(), vec!["Foo+Bar"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_expression(""), Err(ParseError::Empty));
        assert_eq!(
            parse_expression("AND MIT"),
            Err(ParseError::UnexpectedToken {
                token: "AND".into(),
                position: 0
            })
        );
        assert_eq!(
            parse_expression("MIT AND"),
            Err(ParseError::UnexpectedEnd { position: 2 })
        );
        assert_eq!(
            parse_expression("(MIT OR ISC"),
            Err(ParseError::UnclosedParen { position: 0 })
        );
        assert_eq!(
            parse_expression("MIT )"),
            Err(ParseError::UnexpectedToken {
                token: ")".into(),
                position: 1
            })
        );
        assert_eq!(
            parse_expression("MIT ISC"),
            Err(ParseError::UnexpectedToken {
                token: "ISC".into(),
                position: 1
            })
        );
        assert_eq!(
            parse_expression("()"),
            Err(ParseError::UnexpectedToken {
                token: ")".into(),
                position: 1
            })
        );
        assert_eq!(
            parse_expression("GPL-2.0-only WITH"),
            Err(ParseError::UnexpectedEnd { position: 2 })
        );
        assert_eq!(
            parse_expression("GPL-2.0-only WITH OR"),
            Err(ParseError::UnexpectedToken {
                token: "OR".into(),
                position: 2
            })
        );
    }

    #[test]
    fn test_depth_limit() {
        let ok = format!("{}MIT{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse_expression(&ok).is_ok());

        let deep = format!("{}MIT{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(
            parse_expression(&deep),
            Err(ParseError::TooDeep {
                position: MAX_DEPTH,
                limit: MAX_DEPTH
            })
        );
    }

    fn and_chain(terms: usize) -> String {
        vec!["MIT"; terms].join(" AND ")
    }

    #[test]
    fn test_operator_limit_on_flat_chain() {
        let max = and_chain(MAX_OPERATORS + 1);
        let root = parse_expression(&max).unwrap();
        assert_eq!(root.to_string(), max);
        assert_eq!(root.evaluate(&|_: &str| UsagePolicy::Allow), UsagePolicy::Allow);

        assert_eq!(
            parse_expression(&and_chain(MAX_OPERATORS + 2)),
            Err(ParseError::TooLong {
                position: 2 * MAX_OPERATORS + 1,
                limit: MAX_OPERATORS
            })
        );
    }

    #[test]
    fn test_long_chain_fails_fast() {
        let chain = and_chain(10_000);
        assert!(matches!(
            parse_expression(&chain),
            Err(ParseError::TooLong { .. })
        ));

        let mixed = (0..10_000)
            .map(|i| if i % 2 == 0 { "(MIT OR ISC)" } else { "Apache-2.0" })
            .collect::<Vec<_>>()
            .join(" AND ");
        assert!(matches!(
            parse_expression(&mixed),
            Err(ParseError::TooLong { .. })
        ));
    }

    #[test]
    fn test_evaluate_memoizes() {
        let root = parse_expression("MIT AND ISC").unwrap();
        assert_eq!(root.policy(), None);
        let leaf = |id: &str| {
            if id == "MIT" {
                UsagePolicy::Allow
            } else {
                UsagePolicy::NeedsReview
            }
        };
        assert_eq!(root.evaluate(&leaf), UsagePolicy::NeedsReview);
        assert_eq!(root.policy(), Some(UsagePolicy::NeedsReview));
    }

    #[test]
    fn test_evaluate_with_and_invalid_leaf() {
        let allow = |_: &str| UsagePolicy::Allow;
        let with = parse_expression("GPL-2.0-only WITH Classpath-exception-2.0").unwrap();
        assert_eq!(with.evaluate(&allow), UsagePolicy::Allow);

        let invalid = parse_expression("MIT OR Foo+Bar").unwrap();
        assert_eq!(invalid.evaluate(&allow), UsagePolicy::Undefined);
    }

    proptest! {
        #[test]
        fn prop_tokenize_idempotent(expr in "[A-Za-z0-9 \t\n().+-]{0,48}") {
            let first = tokenize(&expr);
            let second = tokenize(&first.join(" "));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_parse_never_panics(expr in "(MIT|ISC|AND|OR|WITH|\\(|\\)| ){0,24}") {
            let _ = parse_expression(&expr);
        }
    }
}
