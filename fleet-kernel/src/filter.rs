/**
 * QUERY / FILTER ENGINE - Subset of the inventory matching a filter spec
 *
 * ROLE:
 * Applies the dashboard filters (owner, application, server, wave bounds,
 * status, pingable) to the inventory. Every predicate is optional and all
 * active predicates are ANDed.
 *
 * OUTPUT:
 * Owners and applications with zero matching records are omitted entirely.
 * Records inside a group are sorted by wave, ties kept in insertion order.
 */

use crate::inventory::Inventory;
use crate::models::{parse_number, ServerRecord};
use serde::{Deserialize, Serialize};

/// Sentinel accepted by the status/pingable filters meaning "no filter".
pub const MATCH_ALL: &str = "all";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    /// Case-insensitive substring of the owner.
    pub owner: Option<String>,
    /// Case-insensitive substring of the application.
    pub application: Option<String>,
    /// Case-insensitive substring of the server name.
    pub server: Option<String>,
    /// Inclusive lower bound on the shutdown sequence.
    pub sequence_min: Option<f64>,
    /// Inclusive upper bound on the shutdown sequence.
    pub sequence_max: Option<f64>,
    /// Exact, case-insensitive status text (or `all`).
    pub status: Option<String>,
    /// Exact, case-insensitive `yes`/`no` (or `all`).
    pub pingable: Option<String>,
}

/// Query-string shape used by the dashboard (`/status?filterOwner=...`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub filter_owner: Option<String>,
    pub filter_app: Option<String>,
    pub filter_server: Option<String>,
    pub filter_seq_min: Option<String>,
    pub filter_seq_max: Option<String>,
    pub filter_status: Option<String>,
    pub filter_pingable: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<FilterQuery> for FilterSpec {
    /// Empty parameters are absent; non-numeric sequence bounds are ignored.
    /// Fractional bounds are kept, so `1.5` admits waves 2 and up.
    fn from(query: FilterQuery) -> Self {
        Self {
            owner: present(query.filter_owner),
            application: present(query.filter_app),
            server: present(query.filter_server),
            sequence_min: present(query.filter_seq_min).as_deref().and_then(parse_number),
            sequence_max: present(query.filter_seq_max).as_deref().and_then(parse_number),
            status: present(query.filter_status),
            pingable: present(query.filter_pingable),
        }
    }
}

fn contains_ci(haystack: &str, needle: &Option<String>) -> bool {
    match needle {
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
        None => true,
    }
}

fn equals_ci(value: &str, wanted: &Option<String>) -> bool {
    match wanted {
        Some(wanted) if !wanted.eq_ignore_ascii_case(MATCH_ALL) => value.eq_ignore_ascii_case(wanted),
        _ => true,
    }
}

impl FilterSpec {
    pub fn owner(mut self, needle: impl Into<String>) -> Self {
        self.owner = Some(needle.into());
        self
    }

    pub fn application(mut self, needle: impl Into<String>) -> Self {
        self.application = Some(needle.into());
        self
    }

    pub fn server(mut self, needle: impl Into<String>) -> Self {
        self.server = Some(needle.into());
        self
    }

    pub fn sequence_between(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.sequence_min = min;
        self.sequence_max = max;
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn pingable(mut self, pingable: impl Into<String>) -> Self {
        self.pingable = Some(pingable.into());
        self
    }

    pub fn matches_group(&self, owner: &str, application: &str) -> bool {
        contains_ci(owner, &self.owner) && contains_ci(application, &self.application)
    }

    pub fn matches_record(&self, record: &ServerRecord) -> bool {
        let sequence = f64::from(record.shutdown_sequence);
        contains_ci(&record.server, &self.server)
            && self.sequence_min.map_or(true, |min| sequence >= min)
            && self.sequence_max.map_or(true, |max| sequence <= max)
            && equals_ci(record.status.as_str(), &self.status)
            && equals_ci(record.pingable.as_str(), &self.pingable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationMatch {
    pub application: String,
    pub records: Vec<ServerRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerMatch {
    pub owner: String,
    pub applications: Vec<ApplicationMatch>,
}

pub fn filter(inventory: &Inventory, spec: &FilterSpec) -> Vec<OwnerMatch> {
    inventory
        .owners()
        .filter_map(|(owner, apps)| {
            let applications: Vec<ApplicationMatch> = apps
                .iter()
                .filter(|(application, _)| spec.matches_group(owner, application))
                .filter_map(|(application, records)| {
                    let mut matching: Vec<ServerRecord> = records
                        .iter()
                        .filter(|r| spec.matches_record(r))
                        .cloned()
                        .collect();
                    if matching.is_empty() {
                        return None;
                    }
                    matching.sort_by_key(|r| r.shutdown_sequence);
                    Some(ApplicationMatch {
                        application: application.clone(),
                        records: matching,
                    })
                })
                .collect();

            (!applications.is_empty()).then(|| OwnerMatch {
                owner: owner.to_string(),
                applications,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Pingable, ServerStatus};

    fn inventory() -> Inventory {
        let mut inv = Inventory::new();
        inv.insert("Payments", "Api", ServerRecord::new("api-2").with_sequence(2)).unwrap();
        inv.insert("Payments", "Api", ServerRecord::new("api-1").with_sequence(1)).unwrap();
        inv.insert("Payments", "Api", ServerRecord::new("api-0").with_sequence(1).with_status(ServerStatus::Shutdown))
            .unwrap();
        inv.insert("Payments", "Db", ServerRecord::new("db-1").with_status(ServerStatus::Offline).with_pingable(Pingable::No))
            .unwrap();
        inv.insert("Search", "Index", ServerRecord::new("idx-1").with_sequence(4)).unwrap();
        inv
    }

    fn servers(result: &[OwnerMatch]) -> Vec<String> {
        result
            .iter()
            .flat_map(|o| o.applications.iter())
            .flat_map(|a| a.records.iter().map(|r| r.server.clone()))
            .collect()
    }

    #[test]
    fn test_empty_spec_matches_everything_sorted_by_wave() {
        let result = filter(&inventory(), &FilterSpec::default());
        assert_eq!(result.len(), 2);
        let api = &result[0].applications[0];
        assert_eq!(api.application, "Api");
        let order: Vec<_> = api.records.iter().map(|r| r.server.as_str()).collect();
        assert_eq!(order, vec!["api-1", "api-0", "api-2"]);
    }

    #[test]
    fn test_groups_without_matches_are_omitted() {
        let result = filter(&inventory(), &FilterSpec::default().status("offline"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].owner, "Payments");
        assert_eq!(result[0].applications.len(), 1);
        assert_eq!(result[0].applications[0].application, "Db");
    }

    #[test]
    fn test_substring_filters_are_case_insensitive() {
        let spec = FilterSpec::default().owner("pay").application("API").server("Api-1");
        assert_eq!(servers(&filter(&inventory(), &spec)), vec!["api-1"]);
    }

    #[test]
    fn test_sequence_bounds_are_inclusive() {
        let spec = FilterSpec::default().sequence_between(Some(1.0), Some(2.0));
        assert_eq!(servers(&filter(&inventory(), &spec)), vec!["api-1", "api-0", "api-2"]);
    }

    #[test]
    fn test_all_sentinel_disables_status_and_pingable() {
        let spec = FilterSpec::default().status("ALL").pingable("all");
        assert_eq!(servers(&filter(&inventory(), &spec)).len(), 5);
        let spec = FilterSpec::default().pingable("NO");
        assert_eq!(servers(&filter(&inventory(), &spec)), vec!["db-1"]);
    }

    #[test]
    fn test_query_conversion_drops_empty_and_bad_bounds() {
        let query = FilterQuery {
            filter_owner: Some("".into()),
            filter_seq_min: Some("abc".into()),
            filter_seq_max: Some("3".into()),
            filter_status: Some("online".into()),
            ..Default::default()
        };
        let spec = FilterSpec::from(query);
        assert_eq!(spec.owner, None);
        assert_eq!(spec.sequence_min, None);
        assert_eq!(spec.sequence_max, Some(3.0));
        assert_eq!(spec.status.as_deref(), Some("online"));
    }

    #[test]
    fn test_fractional_bounds_are_honoured() {
        let query = FilterQuery {
            filter_seq_min: Some("1.5".into()),
            filter_seq_max: Some(" 4.0 ".into()),
            ..Default::default()
        };
        let spec = FilterSpec::from(query);
        assert_eq!(spec.sequence_min, Some(1.5));
        assert_eq!(servers(&filter(&inventory(), &spec)), vec!["api-2", "idx-1"]);
    }

    #[test]
    fn test_unknown_pingable_text_matches_exactly() {
        let mut inv = inventory();
        inv.insert("Search", "Index", ServerRecord::new("idx-2").with_pingable(Pingable::Other("maybe".into())))
            .unwrap();
        let spec = FilterSpec::default().pingable("Maybe");
        assert_eq!(servers(&filter(&inv, &spec)), vec!["idx-2"]);
        let spec = FilterSpec::default().pingable("no");
        assert_eq!(servers(&filter(&inv, &spec)), vec!["db-1"]);
    }
}
