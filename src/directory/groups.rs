use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::rpc::{GroupRecord, SubRequest};
use super::session::DirectorySession;
use super::DirectoryError;
use crate::models::group::OptionalGroup;
use crate::models::sponsor::Sponsor;

/// Somewhere group records can be looked up in bulk.
#[async_trait]
pub trait GroupSource: Send + Sync {
    /// Returns one record per requested CN, in request order. Implementations
    /// must make at most one remote round trip per call.
    async fn show_groups(&self, cns: &[String]) -> Result<Vec<GroupRecord>, DirectoryError>;
}

#[async_trait]
impl GroupSource for DirectorySession {
    async fn show_groups(&self, cns: &[String]) -> Result<Vec<GroupRecord>, DirectoryError> {
        let requests: Vec<SubRequest> = cns
            .iter()
            .map(|cn| SubRequest::new("group_show", json!([cn]), json!({ "no_members": false })))
            .collect();

        let batch = self.batch_call(&requests).await?;
        batch
            .results
            .into_iter()
            .zip(cns)
            .map(|(item, cn)| {
                let item = item.map_err(|message| DirectoryError::Rpc {
                    message: format!("group_show {cn}: {message}"),
                })?;
                let record = item.get("result").cloned().unwrap_or(Value::Null);
                Ok(serde_json::from_value(record)?)
            })
            .collect()
    }
}

/// Groups granted because the sponsor already holds the required membership.
/// Manager-gated groups are never granted here.
pub fn membership_grants<'a>(
    sponsor: &Sponsor,
    catalog: &'a [OptionalGroup],
) -> Vec<&'a OptionalGroup> {
    catalog
        .iter()
        .filter(|g| !g.member_manager)
        .filter(|g| g.required_group.is_empty() || sponsor.is_member_of(&g.required_group))
        .collect()
}

/// Resolves member-manager grants for one authorization pass.
///
/// Records are cached by CN for the lifetime of the resolver, so a group is
/// fetched at most once no matter how many optional groups reference it.
/// Build a fresh resolver for each request.
pub struct GroupResolver<'a> {
    source: &'a dyn GroupSource,
    cache: HashMap<String, GroupRecord>,
    batches: usize,
}

impl<'a> GroupResolver<'a> {
    pub fn new(source: &'a dyn GroupSource) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            batches: 0,
        }
    }

    /// Loads every uncached CN in `cns` with a single batch.
    pub async fn fetch(&mut self, cns: &[String]) -> Result<(), DirectoryError> {
        let mut seen = HashSet::new();
        let missing: Vec<String> = cns
            .iter()
            .filter(|cn| !self.cache.contains_key(cn.as_str()) && seen.insert(cn.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let records = self.source.show_groups(&missing).await?;
        self.batches += 1;
        if records.len() != missing.len() {
            return Err(DirectoryError::InvalidRecord(format!(
                "asked for {} groups, got {}",
                missing.len(),
                records.len()
            )));
        }

        self.cache.extend(missing.into_iter().zip(records));
        Ok(())
    }

    pub fn get(&self, cn: &str) -> Option<&GroupRecord> {
        self.cache.get(cn)
    }

    /// Number of remote batches issued so far.
    pub fn batches_issued(&self) -> usize {
        self.batches
    }

    /// Keys of the manager-gated `groups` that `identity` may grant, either as
    /// a direct member manager or as a member of one of the group's manager
    /// groups. Any lookup failure aborts the whole pass.
    pub async fn manager_grants(
        &mut self,
        identity: &str,
        groups: &[&OptionalGroup],
    ) -> Result<HashSet<String>, DirectoryError> {
        let cns: Vec<String> = groups.iter().map(|g| g.key.clone()).collect();
        self.fetch(&cns).await?;

        let mut granted = HashSet::new();
        let mut pending: Vec<(&str, Vec<String>)> = Vec::new();
        for cn in &cns {
            let record = self.record(cn)?;
            if record.membermanager_user.iter().any(|u| u == identity) {
                granted.insert(cn.clone());
            } else if !record.membermanager_group.is_empty() {
                pending.push((cn.as_str(), record.membermanager_group.clone()));
            }
        }

        let manager_cns: Vec<String> = pending
            .iter()
            .flat_map(|(_, managers)| managers.iter().cloned())
            .collect();
        self.fetch(&manager_cns).await?;

        for (cn, managers) in pending {
            for manager in &managers {
                if self.record(manager)?.member_user.iter().any(|u| u == identity) {
                    granted.insert(cn.to_string());
                    break;
                }
            }
        }

        Ok(granted)
    }

    fn record(&self, cn: &str) -> Result<&GroupRecord, DirectoryError> {
        self.get(cn)
            .ok_or_else(|| DirectoryError::InvalidRecord(format!("group {cn} missing from cache")))
    }
}

/// Optional groups from `catalog` the sponsor may grant, in catalog order.
pub async fn grantable_groups(
    source: &dyn GroupSource,
    sponsor: &Sponsor,
    catalog: &[OptionalGroup],
) -> Result<Vec<OptionalGroup>, DirectoryError> {
    let local: HashSet<&str> = membership_grants(sponsor, catalog)
        .into_iter()
        .map(|g| g.key.as_str())
        .collect();

    let gated: Vec<&OptionalGroup> = catalog.iter().filter(|g| g.member_manager).collect();
    let mut resolver = GroupResolver::new(source);
    let managed = resolver.manager_grants(&sponsor.identity, &gated).await?;
    tracing::debug!(
        sponsor = %sponsor.identity,
        batches = resolver.batches_issued(),
        "resolved {} manager-gated grants",
        managed.len()
    );

    Ok(catalog
        .iter()
        .filter(|g| local.contains(g.key.as_str()) || managed.contains(&g.key))
        .cloned()
        .collect())
}
