/**
 * SEQUENCE DEPENDENCY ENGINE - Wave-based shutdown gate
 *
 * ROLE:
 * Partitions one (owner, application) group into waves keyed by
 * `shutdown_sequence` and decides, per server, whether a shutdown may be
 * initiated now.
 *
 * RULE:
 * A server in wave k is allowed iff every server in every lower wave present
 * in the given record set is `shutdown`. The lowest wave is always allowed.
 * Waves hidden by a filter are absent, not satisfied: callers pass the
 * filtered set for the dashboard and the full group when enforcing.
 */

use crate::models::ServerRecord;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatedRecord {
    #[serde(flatten)]
    pub record: ServerRecord,
    pub shutdown_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceBucket {
    pub sequence: u32,
    pub records: Vec<GatedRecord>,
}

/// Groups records into waves, ascending, with the shutdown gate computed.
pub fn plan_waves<'a, I>(records: I) -> Vec<SequenceBucket>
where
    I: IntoIterator<Item = &'a ServerRecord>,
{
    let mut waves: BTreeMap<u32, Vec<ServerRecord>> = BTreeMap::new();
    for record in records {
        waves
            .entry(record.shutdown_sequence)
            .or_default()
            .push(record.clone());
    }

    let mut lower_waves_down = true;
    waves
        .into_iter()
        .map(|(sequence, records)| {
            let allowed = lower_waves_down;
            lower_waves_down &= records.iter().all(|r| r.status.is_shutdown());
            SequenceBucket {
                sequence,
                records: records
                    .into_iter()
                    .map(|record| GatedRecord {
                        record,
                        shutdown_allowed: allowed,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Servers of lower waves than `sequence` that are not shut down yet.
/// Empty means a server of that wave may be shut down.
pub fn blocking_servers<'a, I>(records: I, sequence: u32) -> Vec<String>
where
    I: IntoIterator<Item = &'a ServerRecord>,
{
    records
        .into_iter()
        .filter(|r| r.shutdown_sequence < sequence && !r.status.is_shutdown())
        .map(|r| r.server.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServerStatus;

    fn rec(server: &str, sequence: u32, status: ServerStatus) -> ServerRecord {
        ServerRecord::new(server).with_sequence(sequence).with_status(status)
    }

    fn allowed(buckets: &[SequenceBucket], server: &str) -> bool {
        buckets
            .iter()
            .flat_map(|b| b.records.iter())
            .find(|g| g.record.server == server)
            .map(|g| g.shutdown_allowed)
            .unwrap()
    }

    #[test]
    fn test_buckets_sorted_and_unique() {
        let records = vec![
            rec("c", 3, ServerStatus::Online),
            rec("a", 0, ServerStatus::Online),
            rec("b", 3, ServerStatus::Online),
            rec("d", 1, ServerStatus::Online),
        ];
        let buckets = plan_waves(&records);
        let keys: Vec<u32> = buckets.iter().map(|b| b.sequence).collect();
        assert_eq!(keys, vec![0, 1, 3]);
        let wave3: Vec<_> = buckets[2].records.iter().map(|g| g.record.server.as_str()).collect();
        assert_eq!(wave3, vec!["c", "b"]);
    }

    #[test]
    fn test_lowest_wave_always_allowed() {
        let records = vec![
            rec("a", 2, ServerStatus::Shutdown),
            rec("b", 2, ServerStatus::Online),
        ];
        let buckets = plan_waves(&records);
        assert!(allowed(&buckets, "a"));
        assert!(allowed(&buckets, "b"));
    }

    #[test]
    fn test_unfinished_lower_wave_blocks_all_higher_waves() {
        let records = vec![
            rec("db1", 0, ServerStatus::Shutdown),
            rec("db2", 0, ServerStatus::Online),
            rec("app", 1, ServerStatus::Online),
            rec("web", 2, ServerStatus::Online),
        ];
        let buckets = plan_waves(&records);
        assert!(allowed(&buckets, "db2"));
        assert!(!allowed(&buckets, "app"));
        assert!(!allowed(&buckets, "web"));
    }

    #[test]
    fn test_offline_is_not_shutdown_for_the_gate() {
        let records = vec![
            rec("db", 0, ServerStatus::Offline),
            rec("app", 1, ServerStatus::Online),
        ];
        assert!(!allowed(&plan_waves(&records), "app"));

        let records = vec![
            rec("db", 0, ServerStatus::Other("retired".into())),
            rec("app", 1, ServerStatus::Online),
        ];
        assert!(!allowed(&plan_waves(&records), "app"));
    }

    #[test]
    fn test_completed_waves_open_the_next_one() {
        let records = vec![
            rec("db", 0, ServerStatus::Shutdown),
            rec("app", 1, ServerStatus::Shutdown),
            rec("web", 5, ServerStatus::Online),
        ];
        assert!(allowed(&plan_waves(&records), "web"));
    }

    #[test]
    fn test_blocking_servers_lists_lower_unfinished() {
        let records = vec![
            rec("db", 0, ServerStatus::Online),
            rec("cache", 0, ServerStatus::Shutdown),
            rec("app", 1, ServerStatus::Online),
            rec("web", 2, ServerStatus::Online),
        ];
        assert_eq!(blocking_servers(&records, 2), vec!["db", "app"]);
        assert!(blocking_servers(&records, 0).is_empty());
    }
}
