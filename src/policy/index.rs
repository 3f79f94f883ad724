use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::IndexBuildError;
use crate::license::spdx::{is_valid_family_key, is_valid_spdx_id};
use crate::models::LicensePolicy;

/// Lookup tables over a policy list: by SPDX id and by family key.
///
/// Immutable once built; shared freely between threads.
#[derive(Debug, Default)]
pub struct PolicyIndex {
    by_id: HashMap<String, Arc<LicensePolicy>>,
    by_family: HashMap<String, Vec<Arc<LicensePolicy>>>,
    /// Family keys, longest first, ties in lexicographic order.
    family_match_order: Vec<String>,
}

impl PolicyIndex {
    /// Index `policies` in list order.
    ///
    /// Malformed entries are skipped with a warning, and a family member whose
    /// usage policy disagrees with its family is registered with a warning. In
    /// `strict` mode both are errors instead. Two distinct policies sharing one
    /// SPDX id are always an error.
    pub fn build(policies: &[LicensePolicy], strict: bool) -> Result<Self, IndexBuildError> {
        let mut builder = IndexBuilder {
            index: PolicyIndex::default(),
            strict,
        };
        for (position, policy) in policies.iter().enumerate() {
            builder.register(position, Arc::new(policy.clone()))?;
        }

        let mut index = builder.index;
        let mut families: Vec<String> = index.by_family.keys().cloned().collect();
        families.sort_by(|a, b| (Reverse(a.len()), a).cmp(&(Reverse(b.len()), b)));
        index.family_match_order = families;

        tracing::debug!(
            records = policies.len(),
            ids = index.by_id.len(),
            families = index.by_family.len(),
            "license policy index built"
        );
        Ok(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&LicensePolicy> {
        self.by_id.get(id).map(Arc::as_ref)
    }

    /// Every policy registered under `family`, in registration order.
    pub fn get_by_family(&self, family: &str) -> &[Arc<LicensePolicy>] {
        self.by_family.get(family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Family keys in name-matching order.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.family_match_order.iter().map(String::as_str)
    }

    /// All indexed policies (synthesized child policies included), sorted by
    /// family and then by id. Records without an id come first in their
    /// family.
    pub fn policies(&self) -> Vec<&LicensePolicy> {
        let mut all: Vec<&LicensePolicy> = self
            .by_family
            .values()
            .flatten()
            .map(Arc::as_ref)
            .collect();
        all.sort_by(|a, b| (&a.family, &a.id).cmp(&(&b.family, &b.id)));
        all
    }

    pub fn id_count(&self) -> usize {
        self.by_id.len()
    }

    pub fn family_count(&self) -> usize {
        self.by_family.len()
    }
}

struct IndexBuilder {
    index: PolicyIndex,
    strict: bool,
}

impl IndexBuilder {
    fn register(
        &mut self,
        position: usize,
        policy: Arc<LicensePolicy>,
    ) -> Result<(), IndexBuildError> {
        if let Some(reason) = rejection_reason(&policy) {
            if self.strict {
                return Err(IndexBuildError::InvalidEntry { position, reason });
            }
            tracing::warn!(position, policy = policy.label(), %reason, "skipping license policy entry");
            return Ok(());
        }

        if let Some(id) = &policy.id {
            match self.index.by_id.get(id) {
                Some(existing) if **existing == *policy => {
                    tracing::debug!(id = %id, "identical policy registered twice, ignoring");
                    return Ok(());
                }
                Some(existing) => {
                    return Err(IndexBuildError::ConflictingId {
                        id: id.clone(),
                        existing: existing.name.clone(),
                        incoming: policy.name.clone(),
                    });
                }
                None => {
                    self.index.by_id.insert(id.clone(), Arc::clone(&policy));
                }
            }
        }

        let members = self
            .index
            .by_family
            .entry(policy.family.clone())
            .or_default();
        if let Some(first) = members.first() {
            if first.usage_policy != policy.usage_policy {
                if self.strict {
                    return Err(IndexBuildError::FamilyUsageMismatch {
                        family: policy.family.clone(),
                        name: policy.label().to_string(),
                        expected: first.usage_policy,
                        found: policy.usage_policy,
                    });
                }
                tracing::warn!(
                    family = %policy.family,
                    policy = policy.label(),
                    expected = %first.usage_policy,
                    found = %policy.usage_policy,
                    "usage policy disagrees with its family"
                );
            }
        }
        members.push(Arc::clone(&policy));

        for child in &policy.children {
            self.register(position, Arc::new(derive_child(&policy, child)))?;
        }
        Ok(())
    }
}

fn rejection_reason(policy: &LicensePolicy) -> Option<String> {
    if let Some(id) = &policy.id {
        if !is_valid_spdx_id(id) {
            return Some(format!("malformed SPDX id `{id}`"));
        }
    }
    if !is_valid_family_key(&policy.family) {
        return Some(format!("malformed or reserved family key `{}`", policy.family));
    }
    if !policy.usage_policy.is_assignable() {
        return Some(format!(
            "`{}` cannot be assigned as a usage policy",
            policy.usage_policy
        ));
    }
    None
}

/// Copy of a family record standing in for one of its children.
fn derive_child(parent: &LicensePolicy, child_id: &str) -> LicensePolicy {
    LicensePolicy {
        id: Some(child_id.to_string()),
        children: Vec::new(),
        notes: Vec::new(),
        urls: Vec::new(),
        ..parent.clone()
    }
}
