use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An optional directory group a sponsor may add an invitee to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionalGroup {
    /// Directory CN of the group.
    pub key: String,
    pub display_name: String,
    /// Sponsor membership needed for a membership-gated grant. Empty means anyone.
    pub required_group: String,
    /// Grant is decided by the directory's member-manager attributes instead.
    pub member_manager: bool,
}

#[derive(Debug, Deserialize)]
struct OptionalGroupEntry {
    group_name: String,
    #[serde(default)]
    group_required: String,
    #[serde(default, alias = "memberManager")]
    member_manager: bool,
}

/// Parses the optional group catalog, a JSON object keyed by group CN:
///
/// ```json
/// {"vpn-users": {"group_name": "VPN", "group_required": "staff", "member_manager": false}}
/// ```
pub fn parse_catalog(raw: &str) -> Result<Vec<OptionalGroup>, serde_json::Error> {
    let entries: BTreeMap<String, OptionalGroupEntry> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .map(|(key, entry)| OptionalGroup {
            key,
            display_name: entry.group_name,
            required_group: entry.group_required,
            member_manager: entry.member_manager,
        })
        .collect())
}
