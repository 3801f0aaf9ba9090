//! Whole-document validation of configuration candidates.
//!
//! Validation runs against the complete candidate document plus the current
//! node group definitions, and reports every violation it can find in a
//! single pass. Callers reject the write when the returned list is non-empty;
//! an accepted document is one that produced no violations at the moment of
//! commit.

use crate::node_group::NodeGroup;
use crate::settings::Settings;

/// Log levels accepted by `logger.default_level`.
const VALID_LOG_LEVELS: [&str; 4] = ["debug", "info", "warning", "error"];

/// Required length of a non-empty CSRF key.
const CSRF_KEY_LEN: usize = 32;

/// Checks a candidate document against the current node groups.
///
/// Returns every violation found, in document order. An empty result means
/// the candidate is safe to commit. Individual checks are independent: one
/// failing field never masks another.
#[must_use]
pub fn validate_settings(candidate: &Settings, node_groups: &[NodeGroup]) -> Vec<String> {
    let mut violations = Vec::new();

    if candidate.api_url.is_empty() {
        violations.push("API hostname must not be empty".to_string());
    }

    let csrf_key = &candidate.ui.csrf_key;
    if !csrf_key.is_empty() && csrf_key.len() != CSRF_KEY_LEN {
        violations.push("CSRF key must be 32 characters long".to_string());
    }

    validate_container_pools(candidate, node_groups, &mut violations);

    let level = &candidate.logger.default_level;
    if !VALID_LOG_LEVELS.contains(&level.as_str()) {
        violations.push(format!("{level} is not a valid log level"));
    }

    violations
}

/// Checks pool id uniqueness, capacity, and node group references.
fn validate_container_pools(
    candidate: &Settings,
    node_groups: &[NodeGroup],
    violations: &mut Vec<String>,
) {
    let mut seen_ids = std::collections::HashSet::new();

    for pool in &candidate.container_pools.pools {
        if !seen_ids.insert(pool.id.as_str()) {
            violations.push(format!("container pool {} is not unique", pool.id));
        }

        if pool.max_containers <= 0 {
            violations.push(format!(
                "container pool {} must specify a positive capacity",
                pool.id
            ));
        }

        match node_groups.iter().find(|g| g.id == pool.distro) {
            Some(group) => {
                // A group already assigned to a pool cannot back another one.
                let nested = group
                    .container_pool
                    .as_deref()
                    .is_some_and(|assigned| !assigned.is_empty());
                if nested {
                    violations.push(format!("container pool {} has invalid distro", pool.id));
                }
            }
            None => {
                violations.push(format!(
                    "error finding distro for container pool {}",
                    pool.id
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ContainerPool;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.api_url = "https://ci.example.com".to_string();
        settings
    }

    fn pool(id: &str, distro: &str) -> ContainerPool {
        ContainerPool {
            id: id.to_string(),
            distro: distro.to_string(),
            max_containers: 100,
        }
    }

    fn fleet() -> Vec<NodeGroup> {
        let backing = NodeGroup::new("valid-distro");
        let mut pooled = NodeGroup::new("invalid-distro");
        pooled.container_pool = Some("test-pool-1".to_string());
        vec![backing, pooled]
    }

    #[test]
    fn valid_document_produces_no_violations() {
        let mut settings = valid_settings();
        settings.container_pools.pools = vec![pool("test-pool-1", "valid-distro")];

        assert!(validate_settings(&settings, &fleet()).is_empty());
    }

    #[test]
    fn empty_api_hostname_is_rejected() {
        let mut settings = valid_settings();
        settings.api_url.clear();

        let violations = validate_settings(&settings, &[]);
        assert_eq!(violations, vec!["API hostname must not be empty"]);
    }

    #[test]
    fn short_csrf_key_is_rejected() {
        let mut settings = valid_settings();
        settings.ui.csrf_key = "12345".to_string();

        let violations = validate_settings(&settings, &[]);
        assert_eq!(violations, vec!["CSRF key must be 32 characters long"]);
    }

    #[test]
    fn empty_csrf_key_is_allowed() {
        let settings = valid_settings();
        assert!(settings.ui.csrf_key.is_empty());
        assert!(validate_settings(&settings, &[]).is_empty());
    }

    #[test]
    fn exact_length_csrf_key_is_allowed() {
        let mut settings = valid_settings();
        settings.ui.csrf_key = "a".repeat(32);
        assert!(validate_settings(&settings, &[]).is_empty());
    }

    #[test]
    fn all_violations_are_reported_together() {
        let mut settings = Settings::default();
        settings.api_url.clear();
        settings.ui.csrf_key = "short".to_string();
        settings.logger.default_level = "loud".to_string();

        let violations = validate_settings(&settings, &[]);
        assert_eq!(
            violations,
            vec![
                "API hostname must not be empty",
                "CSRF key must be 32 characters long",
                "loud is not a valid log level",
            ]
        );
    }

    #[test]
    fn pool_reference_failures_are_distinguished() {
        let mut settings = valid_settings();
        settings.container_pools.pools = vec![
            pool("test-pool-1", "valid-distro"),
            pool("test-pool-2", "invalid-distro"),
            pool("test-pool-3", "missing-distro"),
        ];

        let violations = validate_settings(&settings, &fleet());
        assert_eq!(
            violations,
            vec![
                "container pool test-pool-2 has invalid distro",
                "error finding distro for container pool test-pool-3",
            ]
        );
    }

    #[test]
    fn duplicate_pool_ids_are_rejected() {
        let mut settings = valid_settings();
        settings.container_pools.pools = vec![
            pool("test-pool-1", "valid-distro"),
            pool("test-pool-1", "valid-distro"),
        ];

        let violations = validate_settings(&settings, &fleet());
        assert_eq!(violations, vec!["container pool test-pool-1 is not unique"]);
    }

    #[test]
    fn non_positive_capacity_is_rejected() {
        let mut settings = valid_settings();
        let mut zero_cap = pool("test-pool-1", "valid-distro");
        zero_cap.max_containers = 0;
        settings.container_pools.pools = vec![zero_cap];

        let violations = validate_settings(&settings, &fleet());
        assert_eq!(
            violations,
            vec!["container pool test-pool-1 must specify a positive capacity"]
        );
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut settings = valid_settings();
        settings.logger.default_level = "verbose".to_string();

        let violations = validate_settings(&settings, &[]);
        assert_eq!(violations, vec!["verbose is not a valid log level"]);
    }
}
