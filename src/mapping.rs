use serde::{Deserialize, Serialize};

/// Business-profile attribute a form field can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAttribute {
    Name,
    Email,
    Phone,
    Company,
    Url,
    Description,
    Address,
    City,
    State,
    Country,
    PostalCode,
}

impl ProfileAttribute {
    /// Stable key, matching the snapshot's serialized field names. The
    /// generated script uses the same keys to index the embedded profile.
    pub fn key(&self) -> &'static str {
        match self {
            ProfileAttribute::Name => "name",
            ProfileAttribute::Email => "email",
            ProfileAttribute::Phone => "phone",
            ProfileAttribute::Company => "company",
            ProfileAttribute::Url => "url",
            ProfileAttribute::Description => "description",
            ProfileAttribute::Address => "address",
            ProfileAttribute::City => "city",
            ProfileAttribute::State => "state",
            ProfileAttribute::Country => "country",
            ProfileAttribute::PostalCode => "postal_code",
        }
    }
}

/// What we know about a form input before deciding which attribute it wants.
///
/// A small immutable value type over the DOM attributes that carry naming
/// signal; no live DOM access happens on the server side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub id: String,
    pub placeholder: String,
    /// The input's declared `type` attribute (lowercased), e.g. "email".
    pub declared_type: String,
}

impl FieldDescriptor {
    /// Lowercased concatenation of the naming attributes — the text the
    /// keyword rules match against.
    fn haystack(&self) -> String {
        format!("{} {} {}", self.name, self.id, self.placeholder).to_lowercase()
    }
}

/// Runtime state of a field, separate from its naming. Used to decide
/// whether a mapped field may be written at all.
#[derive(Debug, Clone, Default)]
pub struct FieldState {
    pub value: String,
    pub disabled: bool,
    pub read_only: bool,
}

/// One mapping rule: match either on the declared input type or on any of a
/// set of keywords in the descriptor haystack.
#[derive(Debug)]
pub struct MappingRule {
    pub types: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub attribute: ProfileAttribute,
}

/// Ordered rule list — first match wins.
///
/// Order is load-bearing because substring predicates overlap:
/// declared-type rules come first (an input declaring `type="email"` is
/// unambiguous no matter what it is called), then attribute-specific
/// keywords ("business_email_address" must resolve to email even though it
/// also contains "business" and "address"), and the bare "name" fallback is
/// last so "company_name" resolves to company rather than personal name.
pub const MAPPING_RULES: &[MappingRule] = &[
    // Declared-type rules: unambiguous, checked before any keyword.
    MappingRule {
        types: &["email"],
        keywords: &[],
        attribute: ProfileAttribute::Email,
    },
    MappingRule {
        types: &["tel"],
        keywords: &[],
        attribute: ProfileAttribute::Phone,
    },
    MappingRule {
        types: &["url"],
        keywords: &[],
        attribute: ProfileAttribute::Url,
    },
    // Attribute-specific keywords, most specific first.
    MappingRule {
        types: &[],
        keywords: &["email", "e-mail"],
        attribute: ProfileAttribute::Email,
    },
    MappingRule {
        types: &[],
        keywords: &["phone", "mobile", "telephone", "cell"],
        attribute: ProfileAttribute::Phone,
    },
    MappingRule {
        types: &[],
        keywords: &["website", "url", "homepage", "domain"],
        attribute: ProfileAttribute::Url,
    },
    MappingRule {
        types: &[],
        keywords: &["company", "business", "organization", "organisation", "firm"],
        attribute: ProfileAttribute::Company,
    },
    MappingRule {
        types: &[],
        keywords: &["postal", "zip", "postcode"],
        attribute: ProfileAttribute::PostalCode,
    },
    MappingRule {
        types: &[],
        keywords: &["address", "street"],
        attribute: ProfileAttribute::Address,
    },
    MappingRule {
        types: &[],
        keywords: &["city", "town", "locality"],
        attribute: ProfileAttribute::City,
    },
    MappingRule {
        types: &[],
        keywords: &["state", "province", "region"],
        attribute: ProfileAttribute::State,
    },
    MappingRule {
        types: &[],
        keywords: &["country"],
        attribute: ProfileAttribute::Country,
    },
    MappingRule {
        types: &[],
        keywords: &["description", "about", "summary", "bio", "overview"],
        attribute: ProfileAttribute::Description,
    },
    // Generic fallback: personal name, only when nothing above claimed the
    // field.
    MappingRule {
        types: &[],
        keywords: &["name"],
        attribute: ProfileAttribute::Name,
    },
];

/// Map a form-field descriptor to a business-profile attribute.
///
/// Pure and heuristic: evaluates `MAPPING_RULES` top to bottom and returns
/// the first hit, or None when no rule applies. No scoring, no layout
/// inspection — the contract is best-effort, never destructive.
pub fn map_field(descriptor: &FieldDescriptor) -> Option<ProfileAttribute> {
    let haystack = descriptor.haystack();
    let declared_type = descriptor.declared_type.to_lowercase();

    for rule in MAPPING_RULES {
        if rule.types.iter().any(|t| *t == declared_type) {
            return Some(rule.attribute);
        }
        if rule.keywords.iter().any(|kw| haystack.contains(kw)) {
            return Some(rule.attribute);
        }
    }
    None
}

/// Whether a mapped field may be written. Refusing populated, disabled, or
/// read-only fields is a safety invariant, not an optimization: the engine
/// must never overwrite user-entered or pre-filled data on a third-party
/// form.
pub fn should_fill(state: &FieldState) -> bool {
    state.value.trim().is_empty() && !state.disabled && !state.read_only
}

// ── Tests ────────────────────────────────────────────────────
