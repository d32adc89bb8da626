// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use std::collections::BTreeMap;

pub const APP_PREFIX: &str = "vfr-nav-";
pub const PLAN_PREFIX: &str = "vfr-nav-fpl-";
/// Holds the key of the plan selected last. Not a plan key.
pub const SELECTED_PLAN_KEY: &str = "vfr-nav-sel-fpl";
pub const DEFAULT_PLAN_NAME: &str = "1";

/// Storage key of a named plan. Distinct names always give distinct keys.
pub fn plan_key(name: &str) -> String {
    format!("{}{}", PLAN_PREFIX, name)
}

pub fn default_plan_key() -> String {
    plan_key(DEFAULT_PLAN_NAME)
}

pub fn is_plan_key(key: &str) -> bool {
    key.starts_with(PLAN_PREFIX)
}

/// Display name of a plan key.
pub fn plan_name(key: &str) -> &str {
    key.strip_prefix(PLAN_PREFIX).unwrap_or(key)
}

/// Sorted plan keys mapped to their display names.
pub fn registry_from_keys<I, K>(keys: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    keys.into_iter()
        .filter(|key| is_plan_key(key.as_ref()))
        .map(|key| {
            let key = key.as_ref();
            (key.to_string(), plan_name(key).to_string())
        })
        .collect()
}

/// Plan to load at startup: the last selected one if it still exists, else the
/// first registered plan, else the default key.
pub fn startup_key(registry: &BTreeMap<String, String>, selected: Option<&str>) -> String {
    if let Some(selected) = selected {
        if registry.contains_key(selected) {
            return selected.to_string();
        }
        log::warn!(
            "[FlightPlan] Last selected plan {:?} no longer exists",
            selected
        );
    }
    registry
        .keys()
        .next()
        .cloned()
        .unwrap_or_else(default_plan_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip() {
        let key = plan_key("Toussus - Chartres");
        assert_eq!(key, "vfr-nav-fpl-Toussus - Chartres");
        assert_eq!(plan_name(&key), "Toussus - Chartres");
        assert!(!is_plan_key(SELECTED_PLAN_KEY));
        assert!(SELECTED_PLAN_KEY.starts_with(APP_PREFIX));
    }

    #[test]
    fn test_registry_is_sorted_and_filtered() {
        let registry = registry_from_keys([
            "vfr-nav-fpl-b",
            SELECTED_PLAN_KEY,
            "vfr-nav-theme",
            "vfr-nav-fpl-a",
        ]);
        let keys: Vec<&String> = registry.keys().collect();
        assert_eq!(keys, ["vfr-nav-fpl-a", "vfr-nav-fpl-b"]);
        assert_eq!(registry["vfr-nav-fpl-a"], "a");
    }

    #[test]
    fn test_startup_key_fallbacks() {
        let registry = registry_from_keys(["vfr-nav-fpl-b", "vfr-nav-fpl-a"]);

        assert_eq!(startup_key(&registry, Some("vfr-nav-fpl-b")), "vfr-nav-fpl-b");
        assert_eq!(startup_key(&registry, Some("vfr-nav-fpl-gone")), "vfr-nav-fpl-a");
        assert_eq!(startup_key(&registry, None), "vfr-nav-fpl-a");
        assert_eq!(startup_key(&BTreeMap::new(), None), "vfr-nav-fpl-1");
    }
}
