use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Separator between permission segments (`resource:subresource:action`).
pub const SEGMENT_SEPARATOR: char = ':';

/// A single wildcard segment.
pub const WILDCARD_SEGMENT: &str = "*";

/// Permission identifier.
///
/// Permissions are strings of the form `resource:subresource:action`
/// (e.g. `"lead:own:read"`). Any segment may be `*`, which matches every value
/// in that position. The bare `"*"` and `"*:*:*"` are the super-admin
/// wildcards and satisfy every requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The canonical super-admin wildcard.
    pub fn super_admin() -> Self {
        Self::new("*")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_super_admin(&self) -> bool {
        matches!(self.as_str(), "*" | "*:*:*")
    }

    /// True if any segment is a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.segments().any(|s| s == WILDCARD_SEGMENT)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEGMENT_SEPARATOR)
    }

    /// Whether this (granted) permission satisfies `required`.
    ///
    /// Segments are compared positionally; a granted `*` segment matches any
    /// required segment. Permissions with different segment counts only match
    /// on exact equality.
    pub fn covers(&self, required: &Permission) -> bool {
        if self.is_super_admin() || self == required {
            return true;
        }

        let granted: Vec<&str> = self.segments().collect();
        let wanted: Vec<&str> = required.segments().collect();
        if granted.len() != wanted.len() {
            return false;
        }

        granted
            .iter()
            .zip(wanted.iter())
            .all(|(g, w)| *g == WILDCARD_SEGMENT || g == w)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// True if any granted permission covers `required`.
pub fn has_permission(granted: &[Permission], required: &Permission) -> bool {
    granted.iter().any(|g| g.covers(required))
}

/// True if at least one of `required` is covered. An empty requirement list is
/// never satisfied.
pub fn has_any_permission(granted: &[Permission], required: &[Permission]) -> bool {
    required.iter().any(|r| has_permission(granted, r))
}

/// True if every entry of `required` is covered.
pub fn has_all_permissions(granted: &[Permission], required: &[Permission]) -> bool {
    required.iter().all(|r| has_permission(granted, r))
}

/// Codes in `requested` that the catalog does not know.
///
/// A concrete code must appear in the catalog verbatim. A wildcard pattern is
/// accepted if it covers at least one catalog code; super-admin wildcards are
/// always accepted.
pub fn unknown_permissions(requested: &[Permission], catalog: &[Permission]) -> Vec<Permission> {
    requested
        .iter()
        .filter(|p| {
            if p.is_super_admin() {
                return false;
            }
            if p.is_wildcard() {
                !catalog.iter().any(|c| p.covers(c))
            } else {
                !catalog.contains(p)
            }
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn perms(raw: &[&str]) -> Vec<Permission> {
        raw.iter().map(|p| Permission::from(*p)).collect()
    }

    #[test]
    fn catalog_validation_accepts_known_codes_and_covering_wildcards() {
        let catalog = perms(&["lead:own:read", "lead:own:write", "campaign:team:read"]);
        let requested = perms(&["lead:own:read", "lead:*:*", "*", "report:*:*", "lead:own:purge"]);

        assert_eq!(
            unknown_permissions(&requested, &catalog),
            perms(&["report:*:*", "lead:own:purge"])
        );
    }

    #[test]
    fn exact_match_is_granted() {
        let granted = perms(&["lead:own:read"]);
        assert!(has_permission(&granted, &"lead:own:read".into()));
        assert!(!has_permission(&granted, &"lead:own:write".into()));
        assert!(!has_permission(&granted, &"campaign:own:read".into()));
    }

    #[test]
    fn resource_wildcard_covers_specific_permissions_of_that_resource() {
        let granted = perms(&["lead:*:*"]);
        assert!(has_permission(&granted, &"lead:own:read".into()));
        assert!(has_permission(&granted, &"lead:team:delete".into()));
        assert!(!has_permission(&granted, &"campaign:own:read".into()));
    }

    #[test]
    fn super_admin_wildcards_cover_everything() {
        for admin in ["*", "*:*:*"] {
            let granted = perms(&[admin]);
            assert!(has_permission(&granted, &"settings:company:write".into()));
            assert!(has_permission(&granted, &"anything".into()));
        }
    }

    #[test]
    fn segment_count_mismatch_only_matches_exactly() {
        let granted = perms(&["lead:*"]);
        assert!(!has_permission(&granted, &"lead:own:read".into()));
        assert!(has_permission(&granted, &"lead:*".into()));
    }

    #[test]
    fn any_and_all() {
        let granted = perms(&["lead:own:read", "campaign:*:read"]);
        let required = perms(&["lead:own:write", "campaign:team:read"]);

        assert!(has_any_permission(&granted, &required));
        assert!(!has_all_permissions(&granted, &required));
        assert!(has_all_permissions(&granted, &perms(&["campaign:all:read", "lead:own:read"])));
        assert!(!has_any_permission(&granted, &[]));
        assert!(has_all_permissions(&granted, &[]));
    }

    #[test]
    fn empty_grant_denies() {
        assert!(!has_permission(&[], &"lead:own:read".into()));
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z]{1,6}"
    }

    proptest! {
        #[test]
        fn listed_permission_is_always_granted(
            resource in segment(), sub in segment(), action in segment(),
            noise in proptest::collection::vec("[a-z]{1,6}:[a-z]{1,6}:[a-z]{1,6}", 0..5),
        ) {
            let required = Permission::from(format!("{resource}:{sub}:{action}"));
            let mut granted: Vec<Permission> = noise.into_iter().map(Permission::from).collect();
            granted.push(required.clone());
            prop_assert!(has_permission(&granted, &required));
        }

        #[test]
        fn resource_wildcard_matches_iff_resource_matches(
            granted_resource in segment(), resource in segment(), sub in segment(), action in segment(),
        ) {
            let granted = vec![Permission::from(format!("{granted_resource}:*:*"))];
            let required = Permission::from(format!("{resource}:{sub}:{action}"));
            prop_assert_eq!(has_permission(&granted, &required), granted_resource == resource);
        }

        #[test]
        fn non_covering_grants_deny(
            a in segment(), b in segment(), c in segment(), d in segment(),
        ) {
            prop_assume!(a != d);
            let granted = vec![Permission::from(format!("{a}:{b}:{c}"))];
            let required = Permission::from(format!("{d}:{b}:{c}"));
            prop_assert!(!has_permission(&granted, &required));
        }
    }
}
