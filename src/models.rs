use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Compliance disposition attached to a license declaration.
///
/// Only `Allow`, `Deny` and `NeedsReview` may be assigned by a policy record;
/// `Undefined` and `Conflict` are produced by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UsagePolicy {
    #[serde(rename = "allow")]
    Allow,
    #[serde(rename = "deny")]
    Deny,
    #[serde(rename = "needs-review")]
    NeedsReview,
    #[default]
    #[serde(rename = "UNDEFINED")]
    Undefined,
    #[serde(rename = "CONFLICT")]
    Conflict,
}

impl UsagePolicy {
    /// Every variant, most restrictive first.
    pub const ALL: [UsagePolicy; 5] = [
        UsagePolicy::Deny,
        UsagePolicy::Conflict,
        UsagePolicy::NeedsReview,
        UsagePolicy::Undefined,
        UsagePolicy::Allow,
    ];

    /// Whether a policy record may carry this value.
    pub fn is_assignable(self) -> bool {
        matches!(
            self,
            UsagePolicy::Allow | UsagePolicy::Deny | UsagePolicy::NeedsReview
        )
    }

    /// Rank in `Deny > Conflict > NeedsReview > Undefined > Allow`.
    fn restrictiveness(self) -> u8 {
        match self {
            UsagePolicy::Deny => 4,
            UsagePolicy::Conflict => 3,
            UsagePolicy::NeedsReview => 2,
            UsagePolicy::Undefined => 1,
            UsagePolicy::Allow => 0,
        }
    }

    /// The more restrictive of two policies.
    pub fn most_restrictive(self, other: UsagePolicy) -> UsagePolicy {
        if other.restrictiveness() > self.restrictiveness() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for UsagePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsagePolicy::Allow => write!(f, "allow"),
            UsagePolicy::Deny => write!(f, "deny"),
            UsagePolicy::NeedsReview => write!(f, "needs-review"),
            UsagePolicy::Undefined => write!(f, "UNDEFINED"),
            UsagePolicy::Conflict => write!(f, "CONFLICT"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown usage policy `{0}`")]
pub struct UnknownUsagePolicy(pub String);

impl FromStr for UsagePolicy {
    type Err = UnknownUsagePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        UsagePolicy::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownUsagePolicy(trimmed.to_string()))
    }
}

/// One record of the policy configuration.
///
/// Records are read once and never mutated; family records with `children`
/// are expanded into one synthetic record per child at index-build time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicensePolicy {
    #[serde(
        default,
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Link to the canonical license page.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, rename = "osi")]
    pub is_osi_approved: bool,
    #[serde(default, rename = "fsf")]
    pub is_fsf_libre: bool,
    #[serde(default, rename = "deprecated")]
    pub is_deprecated: bool,
    pub family: String,
    #[serde(default)]
    pub name: String,
    /// Unrecognised values deserialize as `Undefined` so that the entry can
    /// be skipped at index-build time instead of failing the whole load.
    #[serde(default, deserialize_with = "lenient_usage_policy")]
    pub usage_policy: UsagePolicy,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub annotation_refs: Vec<String>,
}

impl LicensePolicy {
    /// Minimal record, mostly useful for building configurations in code.
    pub fn new(id: Option<&str>, family: &str, usage_policy: UsagePolicy) -> Self {
        Self {
            id: id.map(str::to_string),
            reference: String::new(),
            is_osi_approved: false,
            is_fsf_libre: false,
            is_deprecated: false,
            family: family.to_string(),
            name: id.unwrap_or(family).to_string(),
            usage_policy,
            aliases: Vec::new(),
            children: Vec::new(),
            notes: Vec::new(),
            urls: Vec::new(),
            annotation_refs: Vec::new(),
        }
    }

    /// Label used in logs and error messages.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

fn non_empty_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn lenient_usage_policy<'de, D: Deserializer<'de>>(d: D) -> Result<UsagePolicy, D::Error> {
    let raw = String::deserialize(d)?;
    Ok(raw.parse().unwrap_or_else(|e: UnknownUsagePolicy| {
        tracing::warn!(error = %e, "policy record carries an unsupported usage policy");
        UsagePolicy::Undefined
    }))
}

/// A license as declared by a BOM component.
///
/// The variant is fixed when the declaration is built from the BOM field that
/// was populated. On the wire it uses the CycloneDX license-choice shape:
/// `{"license":{"id":..}}`, `{"license":{"name":..}}` or `{"expression":..}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LicenseChoice", into = "LicenseChoice")]
pub enum LicenseDeclaration {
    ById(String),
    ByName(String),
    ByExpression(String),
}

impl LicenseDeclaration {
    /// Pick the variant from whichever BOM field is populated.
    ///
    /// `id` wins over `name`, which wins over `expression`. Blank fields count
    /// as absent.
    pub fn from_fields(
        id: Option<&str>,
        name: Option<&str>,
        expression: Option<&str>,
    ) -> Option<Self> {
        fn present(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        if let Some(id) = present(id) {
            return Some(LicenseDeclaration::ById(id.to_string()));
        }
        if let Some(name) = present(name) {
            return Some(LicenseDeclaration::ByName(name.to_string()));
        }
        present(expression).map(|e| LicenseDeclaration::ByExpression(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LicenseDeclaration::ById(_) => "id",
            LicenseDeclaration::ByName(_) => "name",
            LicenseDeclaration::ByExpression(_) => "expression",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            LicenseDeclaration::ById(v)
            | LicenseDeclaration::ByName(v)
            | LicenseDeclaration::ByExpression(v) => v,
        }
    }
}

impl std::fmt::Display for LicenseDeclaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

/// CycloneDX license-choice wire shape.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LicenseChoice {
    License { license: LicenseBody },
    Expression { expression: String },
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LicenseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl TryFrom<LicenseChoice> for LicenseDeclaration {
    type Error = String;

    fn try_from(choice: LicenseChoice) -> Result<Self, Self::Error> {
        let declaration = match &choice {
            LicenseChoice::License { license } => {
                LicenseDeclaration::from_fields(license.id.as_deref(), license.name.as_deref(), None)
            }
            LicenseChoice::Expression { expression } => {
                LicenseDeclaration::from_fields(None, None, Some(expression.as_str()))
            }
        };
        declaration.ok_or_else(|| "license choice has neither id, name nor expression".to_string())
    }
}

impl From<LicenseDeclaration> for LicenseChoice {
    fn from(decl: LicenseDeclaration) -> Self {
        match decl {
            LicenseDeclaration::ById(id) => LicenseChoice::License {
                license: LicenseBody {
                    id: Some(id),
                    name: None,
                },
            },
            LicenseDeclaration::ByName(name) => LicenseChoice::License {
                license: LicenseBody {
                    id: None,
                    name: Some(name),
                },
            },
            LicenseDeclaration::ByExpression(expression) => LicenseChoice::Expression { expression },
        }
    }
}

/// Per-policy tally of a batch of resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub allow: usize,
    pub deny: usize,
    pub needs_review: usize,
    pub undefined: usize,
    pub conflict: usize,
}

impl UsageSummary {
    pub fn record(&mut self, policy: UsagePolicy) {
        let slot = match policy {
            UsagePolicy::Allow => &mut self.allow,
            UsagePolicy::Deny => &mut self.deny,
            UsagePolicy::NeedsReview => &mut self.needs_review,
            UsagePolicy::Undefined => &mut self.undefined,
            UsagePolicy::Conflict => &mut self.conflict,
        };
        *slot += 1;
    }

    pub fn count(&self, policy: UsagePolicy) -> usize {
        match policy {
            UsagePolicy::Allow => self.allow,
            UsagePolicy::Deny => self.deny,
            UsagePolicy::NeedsReview => self.needs_review,
            UsagePolicy::Undefined => self.undefined,
            UsagePolicy::Conflict => self.conflict,
        }
    }

    pub fn total(&self) -> usize {
        UsagePolicy::ALL.iter().map(|p| self.count(*p)).sum()
    }
}

impl FromIterator<UsagePolicy> for UsageSummary {
    fn from_iter<I: IntoIterator<Item = UsagePolicy>>(iter: I) -> Self {
        let mut summary = UsageSummary::default();
        for policy in iter {
            summary.record(policy);
        }
        summary
    }
}
