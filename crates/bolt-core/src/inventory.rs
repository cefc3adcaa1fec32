//! Inventory and server resolution against the automation-inventory API.

use crate::cache::{InventoryCache, InventoryKey};
use crate::tower::{Group, InventoryApi, InventorySummary, UNKNOWN_OS};
use crate::upstream::{skip_layer, UpstreamResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: u64,
    pub name: String,
    pub groups: Vec<Group>,
}

impl InventoryRecord {
    fn mentions(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.name.to_lowercase().contains(&tag)
            || self.groups.iter().any(|g| g.name.to_lowercase().contains(&tag))
    }
}

/// One server backing a (component, environment) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub server_name: String,
    pub group_name: String,
    pub component_name: String,
    pub environment: String,
    pub os_info: String,
    pub enabled: bool,
}

// ---------------------------------------------------------------------------
// find_inventories
// ---------------------------------------------------------------------------

fn search(
    api: &dyn InventoryApi,
    query: &str,
    keep: impl Fn(&InventorySummary) -> bool,
) -> UpstreamResult<Vec<InventorySummary>> {
    let found = skip_layer("inventory-search", api.search_inventories(query))?.unwrap_or_default();
    Ok(found.into_iter().filter(|i| keep(i)).collect())
}

fn with_groups(
    api: &dyn InventoryApi,
    summaries: Vec<InventorySummary>,
) -> UpstreamResult<Vec<InventoryRecord>> {
    let mut records = Vec::with_capacity(summaries.len());
    for summary in summaries {
        match skip_layer("inventory-groups", api.groups(summary.id))? {
            Some(groups) => records.push(InventoryRecord {
                id: summary.id,
                name: summary.name,
                groups,
            }),
            None => tracing::warn!(inventory = %summary.name, "dropping inventory without groups"),
        }
    }
    Ok(records)
}

/// Inventories belonging to `spk`, narrowed to `org_tag` when that tag
/// matches anything.
///
/// Exact `<spk>_PROD` name matches are preferred; case-insensitive matches
/// on the SPK alone are used only when no exact match kept its groups.
pub fn find_inventories(
    api: &dyn InventoryApi,
    spk: &str,
    org_tag: Option<&str>,
) -> UpstreamResult<Vec<InventoryRecord>> {
    if spk.is_empty() {
        return Ok(Vec::new());
    }
    let exact = format!("{spk}_PROD");
    let mut inventories = with_groups(api, search(api, &exact, |i| i.name.contains(&exact))?)?;
    if inventories.is_empty() {
        tracing::info!(spk, "no usable exact inventory match, trying partial");
        let needle = spk.to_lowercase();
        let matches = search(api, spk, |i| i.name.to_lowercase().contains(&needle))?;
        inventories = with_groups(api, matches)?;
    }

    let Some(tag) = org_tag.filter(|t| !t.is_empty()) else {
        return Ok(inventories);
    };
    let filtered: Vec<InventoryRecord> = inventories
        .iter()
        .filter(|inv| inv.mentions(tag))
        .cloned()
        .collect();
    if filtered.is_empty() {
        tracing::info!(org_tag = tag, "organization matched nothing, keeping all inventories");
        Ok(inventories)
    } else {
        Ok(filtered)
    }
}

/// [`find_inventories`] memoized in `cache`. Empty results are not stored.
pub fn find_inventories_cached(
    api: &dyn InventoryApi,
    cache: Option<&InventoryCache>,
    spk: &str,
    org_tag: Option<&str>,
) -> UpstreamResult<Vec<InventoryRecord>> {
    let Some(cache) = cache else {
        return find_inventories(api, spk, org_tag);
    };
    let key = InventoryKey {
        spk: spk.to_string(),
        org_tag: org_tag.map(str::to_string),
    };
    if let Some(hit) = cache.get(&key) {
        tracing::debug!(spk, "inventory cache hit");
        return Ok(hit);
    }
    let found = find_inventories(api, spk, org_tag)?;
    if !found.is_empty() {
        cache.insert(key, found.clone());
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// find_servers
// ---------------------------------------------------------------------------

fn environment_variants(environment: &str) -> Vec<String> {
    let upper = environment.to_uppercase();
    let mut variants = vec![upper.to_lowercase()];
    match upper.as_str() {
        "PROD" => variants.push("production".into()),
        "DEV" => variants.push("development".into()),
        _ => {}
    }
    variants
}

/// Servers in groups whose names mention both `component` and
/// `environment`, deduplicated by server name.
///
/// A host whose detail lookup fails is still reported, with unknown OS and
/// assumed enabled.
pub fn find_servers(
    api: &dyn InventoryApi,
    component: &str,
    environment: &str,
    inventories: &[InventoryRecord],
) -> UpstreamResult<Vec<ServerRecord>> {
    if component.is_empty() || environment.is_empty() {
        return Ok(Vec::new());
    }
    let component_lc = component.to_lowercase();
    let variants = environment_variants(environment);

    let mut servers: Vec<ServerRecord> = Vec::new();
    for inventory in inventories {
        for group in &inventory.groups {
            let group_lc = group.name.to_lowercase();
            if !group_lc.contains(&component_lc) || !variants.iter().any(|v| group_lc.contains(v)) {
                continue;
            }
            tracing::debug!(group = %group.name, "matching group");
            let Some(hosts) = skip_layer("group-hosts", api.hosts(group.id))? else {
                continue;
            };
            for host in hosts {
                if servers.iter().any(|s| s.server_name == host.name) {
                    continue;
                }
                let (os_info, enabled) = match api.host(host.id) {
                    Ok(detail) => (detail.os_info(), detail.enabled),
                    Err(e) if e.is_timeout() => return Err(e),
                    Err(e) => {
                        tracing::warn!(host = %host.name, error = %e, "host detail unavailable");
                        (UNKNOWN_OS.to_string(), true)
                    }
                };
                servers.push(ServerRecord {
                    server_name: host.name,
                    group_name: group.name.clone(),
                    component_name: component.to_string(),
                    environment: environment.to_string(),
                    os_info,
                    enabled,
                });
            }
        }
    }
    tracing::info!(component, environment, count = servers.len(), "servers resolved");
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Failure, FakeInventoryApi};

    fn inventory_names(found: &[InventoryRecord]) -> Vec<&str> {
        found.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn org_tag_narrows_exact_matches() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD_VGPDR---BH", &[(10, "svca_prod")])
            .with_inventory(2, "SPK1_PROD_OTHER", &[(20, "svca_prod")]);
        let found = find_inventories(&api, "SPK1", Some("VGPDR---BH")).unwrap();
        assert_eq!(inventory_names(&found), vec!["SPK1_PROD_VGPDR---BH"]);
        assert_eq!(found[0].groups[0].name, "svca_prod");
    }

    #[test]
    fn org_tag_may_match_a_group_name() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD_A", &[(10, "svca_vgpdr---bh_prod")])
            .with_inventory(2, "SPK1_PROD_B", &[(20, "svca_prod")]);
        let found = find_inventories(&api, "SPK1", Some("VGPDR---BH")).unwrap();
        assert_eq!(inventory_names(&found), vec!["SPK1_PROD_A"]);
    }

    #[test]
    fn unmatched_org_tag_keeps_all() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD_A", &[])
            .with_inventory(2, "SPK1_PROD_B", &[]);
        let found = find_inventories(&api, "SPK1", Some("ZZZZZ---ZZ")).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn partial_match_when_no_exact_prod_inventory() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "codects_uat", &[])
            .with_inventory(2, "unrelated", &[]);
        let found = find_inventories(&api, "CODECTS", None).unwrap();
        assert_eq!(inventory_names(&found), vec!["codects_uat"]);
        assert_eq!(api.count("search:"), 2);
    }

    #[test]
    fn exact_match_is_case_sensitive() {
        // Search is case-insensitive upstream; the exact tier is not.
        let api = FakeInventoryApi::new()
            .with_inventory(1, "spk1_prod", &[])
            .with_inventory(2, "SPK1_PROD", &[]);
        let found = find_inventories(&api, "SPK1", None).unwrap();
        assert_eq!(inventory_names(&found), vec!["SPK1_PROD"]);
    }

    #[test]
    fn inventory_with_failed_group_fetch_is_dropped() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD_A", &[])
            .with_inventory(2, "SPK1_PROD_B", &[])
            .failing("groups:1", Failure::Status(403));
        let found = find_inventories(&api, "SPK1", None).unwrap();
        assert_eq!(inventory_names(&found), vec!["SPK1_PROD_B"]);
    }

    #[test]
    fn partial_tier_runs_when_every_exact_match_loses_its_groups() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD", &[(10, "svca_prod")])
            .with_inventory(2, "spk1_uat", &[(20, "svca_uat")])
            .failing("groups:1", Failure::Status(403));
        let found = find_inventories(&api, "SPK1", None).unwrap();
        assert_eq!(inventory_names(&found), vec!["spk1_uat"]);
        assert_eq!(found[0].groups[0].name, "svca_uat");
        assert_eq!(api.count("search:"), 2);
    }

    #[test]
    fn search_timeout_is_returned() {
        let api = FakeInventoryApi::new().failing("search:SPK1_PROD", Failure::Timeout);
        assert!(find_inventories(&api, "SPK1", None).unwrap_err().is_timeout());
    }

    #[test]
    fn cache_serves_repeat_lookups_and_skips_empty_results() {
        let api = FakeInventoryApi::new().with_inventory(1, "SPK1_PROD", &[]);
        let cache = InventoryCache::new(4).unwrap();

        find_inventories_cached(&api, Some(&cache), "SPK1", None).unwrap();
        let again = find_inventories_cached(&api, Some(&cache), "SPK1", None).unwrap();
        assert_eq!(inventory_names(&again), vec!["SPK1_PROD"]);
        assert_eq!(api.count("search:"), 1);

        find_inventories_cached(&api, Some(&cache), "NOPE", None).unwrap();
        find_inventories_cached(&api, Some(&cache), "NOPE", None).unwrap();
        assert_eq!(cache.len(), 1);
    }

    fn fleet() -> (FakeInventoryApi, Vec<InventoryRecord>) {
        let api = FakeInventoryApi::new()
            .with_inventory(
                1,
                "SPK1_PROD",
                &[
                    (10, "SvcA_Production"),
                    (11, "svca-prod-dr"),
                    (12, "svcb_prod"),
                    (13, "svca_uat"),
                ],
            )
            .with_hosts(10, &[(100, "app01"), (101, "app02")])
            .with_hosts(11, &[(101, "app02"), (102, "app03")])
            .with_detail(100, "RedHat 8.9", true)
            .with_detail(101, "RedHat 8.9", false)
            .failing("host:102", Failure::Status(500));
        let inventories = find_inventories(&api, "SPK1", None).unwrap();
        (api, inventories)
    }

    #[test]
    fn matching_groups_and_dedup() {
        let (api, inventories) = fleet();
        let servers = find_servers(&api, "svca", "prod", &inventories).unwrap();
        let names: Vec<&str> = servers.iter().map(|s| s.server_name.as_str()).collect();
        assert_eq!(names, vec!["app01", "app02", "app03"]);
        assert_eq!(servers[0].group_name, "SvcA_Production");
        assert_eq!(servers[0].os_info, "RedHat 8.9");
        assert!(!servers[1].enabled);
        assert_eq!(servers[1].environment, "prod");
        assert_eq!(api.count("hosts:12"), 0);
        assert_eq!(api.count("hosts:13"), 0);
    }

    #[test]
    fn failed_host_detail_is_kept_as_unknown_and_enabled() {
        let (api, inventories) = fleet();
        let servers = find_servers(&api, "svca", "PROD", &inventories).unwrap();
        let app03 = servers.iter().find(|s| s.server_name == "app03").unwrap();
        assert_eq!(app03.os_info, "Unknown");
        assert!(app03.enabled);
    }

    #[test]
    fn host_detail_timeout_is_returned() {
        let api = FakeInventoryApi::new()
            .with_inventory(1, "SPK1_PROD", &[(10, "svca_dev")])
            .with_hosts(10, &[(100, "app01")])
            .failing("host:100", Failure::Timeout);
        let inventories = find_inventories(&api, "SPK1", None).unwrap();
        assert!(find_servers(&api, "svca", "development", &inventories).is_ok());
        assert!(find_servers(&api, "svca", "DEV", &inventories)
            .unwrap_err()
            .is_timeout());
    }

    #[test]
    fn blank_inputs_yield_no_servers() {
        let (api, inventories) = fleet();
        assert!(find_servers(&api, "", "PROD", &inventories).unwrap().is_empty());
        assert!(find_servers(&api, "svca", "", &inventories).unwrap().is_empty());
    }
}
