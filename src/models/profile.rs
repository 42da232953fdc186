use serde::{Deserialize, Serialize};

use crate::mapping::ProfileAttribute;

/// Longest value accepted for any single profile field. Anything beyond this
/// is truncated at issuance — the snapshot travels inside the generated
/// script, so unbounded fields would bloat every bookmarklet.
const MAX_FIELD_LEN: usize = 2000;

/// Immutable copy of a project's business-contact fields, embedded in a
/// capability token (and in the generated script) at issuance time.
///
/// Every field is a plain string, empty when the project has no value for
/// it. Changes to the project after issuance do not propagate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfileSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
}

impl BusinessProfileSnapshot {
    /// Value for a mapped attribute. Empty string means "mapped, but the
    /// profile has nothing to fill" — mapping and data availability are
    /// separate concerns.
    pub fn value_for(&self, attr: ProfileAttribute) -> &str {
        match attr {
            ProfileAttribute::Name => &self.name,
            ProfileAttribute::Email => &self.email,
            ProfileAttribute::Phone => &self.phone,
            ProfileAttribute::Company => &self.company,
            ProfileAttribute::Url => &self.url,
            ProfileAttribute::Description => &self.description,
            ProfileAttribute::Address => &self.address,
            ProfileAttribute::City => &self.city,
            ProfileAttribute::State => &self.state,
            ProfileAttribute::Country => &self.country,
            ProfileAttribute::PostalCode => &self.postal_code,
        }
    }

    /// Sanitize every field in place: trim, strip control characters, clamp
    /// length. Applied once at issuance; the stored snapshot is final.
    pub fn sanitized(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.email,
            &mut self.phone,
            &mut self.company,
            &mut self.url,
            &mut self.description,
            &mut self.address,
            &mut self.city,
            &mut self.state,
            &mut self.country,
            &mut self.postal_code,
        ] {
            let cleaned: String = field
                .trim()
                .chars()
                .filter(|c| !c.is_control())
                .take(MAX_FIELD_LEN)
                .collect();
            *field = cleaned;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_strips_control_chars() {
        let snap = BusinessProfileSnapshot {
            name: "  Acme\u{0000} Corp\n  ".into(),
            email: "ops@acme.test".into(),
            ..Default::default()
        }
        .sanitized();

        assert_eq!(snap.name, "Acme Corp");
        assert_eq!(snap.email, "ops@acme.test");
        assert_eq!(snap.phone, "");
    }

    #[test]
    fn sanitize_clamps_oversized_fields() {
        let snap = BusinessProfileSnapshot {
            description: "x".repeat(5000),
            ..Default::default()
        }
        .sanitized();

        assert_eq!(snap.description.len(), 2000);
    }

    #[test]
    fn value_for_maps_every_attribute() {
        let snap = BusinessProfileSnapshot {
            city: "Lisbon".into(),
            postal_code: "1100-048".into(),
            ..Default::default()
        };

        assert_eq!(snap.value_for(ProfileAttribute::City), "Lisbon");
        assert_eq!(snap.value_for(ProfileAttribute::PostalCode), "1100-048");
        assert_eq!(snap.value_for(ProfileAttribute::Name), "");
    }
}
