use super::DrugReference;
use crate::models::DrugProfile;
use crate::reference::RecordDomain;
use crate::resolver::{ResolverError, ResolverResult};

impl DrugReference {
    /// Load and validate the stored profile for a slug.
    pub fn fetch_profile(&self, slug: &str) -> ResolverResult<DrugProfile> {
        let json = self
            .store
            .load(RecordDomain::Profile, slug)?
            .ok_or_else(|| ResolverError::NotFound {
                domain: RecordDomain::Profile,
                slug: slug.to_string(),
            })?;

        DrugProfile::from_record_json(&json).map_err(|e| ResolverError::MalformedRecord {
            slug: slug.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolve a drug name and render its profile summary.
    pub fn profile_lookup(&self, drug_name: &str) -> ResolverResult<String> {
        let resolution = self.resolver().resolve_profile(drug_name)?;
        tracing::info!(
            drug = drug_name,
            slug = %resolution.slug,
            matched = %resolution.matched_key,
            "Resolved drug profile"
        );
        Ok(self.fetch_profile(&resolution.slug)?.summary())
    }
}
