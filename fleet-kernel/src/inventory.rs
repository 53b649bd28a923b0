/**
 * INVENTORY STORE - Canonical set of server records
 *
 * ROLE:
 * Owns every server record, grouped owner -> application -> records.
 * Pure storage: no business rules, no logging, no notifications.
 *
 * HOW IT WORKS:
 * - Groups are ordered maps so owners/applications list deterministically
 * - Records keep insertion order inside a group (carries no meaning)
 * - Empty application groups and empty owners are pruned on removal
 * - `replace_all` builds the new inventory aside, then swaps it in
 *
 * CONCURRENCY:
 * The store itself is plain data. It is shared as `Shared<Inventory>`
 * (see `state.rs`), so every mutation runs under the write lock.
 */

use crate::error::{FleetError, FleetResult};
use crate::models::{parse_sequence, InventoryRow, Pingable, RecordPatch, ServerKey, ServerRecord, ServerStatus};
use serde::Serialize;
use std::collections::BTreeMap;

pub const UNKNOWN_GROUP: &str = "Unknown";

pub type Applications = BTreeMap<String, Vec<ServerRecord>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Inventory {
    owners: BTreeMap<String, Applications>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a fresh store. Same semantics as `replace_all`.
    pub fn init<I>(&mut self, seed: I) -> usize
    where
        I: IntoIterator<Item = InventoryRow>,
    {
        self.replace_all(seed)
    }

    pub fn reset(&mut self) {
        self.owners.clear();
    }

    /// Discards the whole inventory and rebuilds it from flat rows.
    ///
    /// Missing fields default (`status` online, `shutdown_sequence` 0,
    /// `pingable` yes, owner/application `Unknown`). Rows without a server
    /// name are skipped, as are later duplicates of a server already seen
    /// in the same group. Returns the number of accepted rows.
    pub fn replace_all<I>(&mut self, rows: I) -> usize
    where
        I: IntoIterator<Item = InventoryRow>,
    {
        let mut rebuilt = Inventory::new();
        let mut accepted = 0;

        for row in rows {
            let Some(server) = non_empty(row.server) else {
                continue;
            };
            let owner = non_empty(row.owner).unwrap_or_else(|| UNKNOWN_GROUP.to_string());
            let application = non_empty(row.application).unwrap_or_else(|| UNKNOWN_GROUP.to_string());

            let record = ServerRecord {
                server,
                status: non_empty(row.status)
                    .map(|s| ServerStatus::parse(&s))
                    .unwrap_or_default(),
                shutdown_sequence: non_empty(row.shutdown_sequence)
                    .map(|s| parse_sequence(&s))
                    .unwrap_or(0),
                pingable: non_empty(row.pingable)
                    .map(|p| Pingable::parse(&p))
                    .unwrap_or_default(),
            };

            if rebuilt.insert(&owner, &application, record).is_ok() {
                accepted += 1;
            }
        }

        *self = rebuilt;
        accepted
    }

    pub fn find(&self, owner: &str, application: &str, server: &str) -> Option<&ServerRecord> {
        self.group(owner, application)?
            .iter()
            .find(|r| r.server == server)
    }

    pub fn find_mut(&mut self, owner: &str, application: &str, server: &str) -> Option<&mut ServerRecord> {
        self.owners
            .get_mut(owner)?
            .get_mut(application)?
            .iter_mut()
            .find(|r| r.server == server)
    }

    /// Records of one (owner, application) group, in insertion order.
    pub fn group(&self, owner: &str, application: &str) -> Option<&[ServerRecord]> {
        self.owners
            .get(owner)?
            .get(application)
            .map(Vec::as_slice)
    }

    /// Appends a record, creating the owner/application groups on demand.
    pub fn insert(&mut self, owner: &str, application: &str, record: ServerRecord) -> FleetResult<()> {
        if self.find(owner, application, &record.server).is_some() {
            return Err(FleetError::DuplicateServer(ServerKey::new(owner, application, record.server)));
        }
        self.owners
            .entry(owner.to_string())
            .or_default()
            .entry(application.to_string())
            .or_default()
            .push(record);
        Ok(())
    }

    pub fn remove(&mut self, owner: &str, application: &str, server: &str) -> FleetResult<ServerRecord> {
        self.position(owner, application, server)
            .and_then(|index| self.remove_at(owner, application, index))
            .ok_or_else(|| FleetError::NotFound(ServerKey::new(owner, application, server)))
    }

    /// Relocates a record (possibly to another owner/application) and merges
    /// `patch` onto it. Backs "edit a record". Nothing changes on failure.
    pub fn move_record(
        &mut self,
        from: &ServerKey,
        new_owner: &str,
        new_application: &str,
        patch: &RecordPatch,
    ) -> FleetResult<ServerKey> {
        let (index, mut record) = self
            .group(&from.owner, &from.application)
            .and_then(|records| {
                records
                    .iter()
                    .enumerate()
                    .find(|(_, r)| r.server == from.server)
            })
            .map(|(index, r)| (index, r.clone()))
            .ok_or_else(|| FleetError::NotFound(from.clone()))?;
        patch.apply(&mut record);

        let same_group = from.owner == new_owner && from.application == new_application;
        if let Some(target) = self.group(new_owner, new_application) {
            let clash = target
                .iter()
                .enumerate()
                .any(|(i, r)| r.server == record.server && !(same_group && i == index));
            if clash {
                return Err(FleetError::DuplicateServer(ServerKey::new(
                    new_owner,
                    new_application,
                    record.server,
                )));
            }
        }

        self.remove_at(&from.owner, &from.application, index)
            .ok_or_else(|| FleetError::NotFound(from.clone()))?;
        let key = ServerKey::new(new_owner, new_application, record.server.clone());
        self.owners
            .entry(key.owner.clone())
            .or_default()
            .entry(key.application.clone())
            .or_default()
            .push(record);
        Ok(key)
    }

    /// Every record as (owner, application, record). Call again to restart.
    pub fn all_records(&self) -> impl Iterator<Item = (&str, &str, &ServerRecord)> + '_ {
        self.owners.iter().flat_map(|(owner, apps)| {
            apps.iter().flat_map(move |(application, records)| {
                records
                    .iter()
                    .map(move |record| (owner.as_str(), application.as_str(), record))
            })
        })
    }

    pub fn owners(&self) -> impl Iterator<Item = (&str, &Applications)> + '_ {
        self.owners.iter().map(|(owner, apps)| (owner.as_str(), apps))
    }

    pub fn len(&self) -> usize {
        self.owners
            .values()
            .flat_map(|apps| apps.values())
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    fn position(&self, owner: &str, application: &str, server: &str) -> Option<usize> {
        self.group(owner, application)?
            .iter()
            .position(|r| r.server == server)
    }

    fn remove_at(&mut self, owner: &str, application: &str, index: usize) -> Option<ServerRecord> {
        let apps = self.owners.get_mut(owner)?;
        let records = apps.get_mut(application)?;
        if index >= records.len() {
            return None;
        }
        let record = records.remove(index);
        if records.is_empty() {
            apps.remove(application);
        }
        if apps.is_empty() {
            self.owners.remove(owner);
        }
        Some(record)
    }
}
