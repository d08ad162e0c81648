use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::Snowflake;

// ============== Policy Pair ==============

/// Allow/deny id sets. Deny always wins over allow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(rename = "whitelist", default)]
    pub allow: BTreeSet<Snowflake>,
    #[serde(rename = "blacklist", default)]
    pub deny: BTreeSet<Snowflake>,
}

impl Policy {
    pub fn allowing(ids: impl IntoIterator<Item = Snowflake>) -> Self {
        Self {
            allow: ids.into_iter().collect(),
            deny: BTreeSet::new(),
        }
    }

    pub fn resolve(&self, ids: &BTreeSet<Snowflake>) -> bool {
        resolve(ids, self)
    }
}

// ============== Resolution ==============

/// Decide whether any of `ids` is permitted by `policy`.
///
/// A single denied id rejects the whole set before allow is consulted.
/// Nothing matching is a rejection too, so an empty set never passes.
pub fn resolve(ids: &BTreeSet<Snowflake>, policy: &Policy) -> bool {
    if ids.iter().any(|id| policy.deny.contains(id)) {
        return false;
    }
    ids.iter().any(|id| policy.allow.contains(id))
}

/// Admin membership is a resolve against the admin set with nothing denied.
pub fn is_admin(actor_id: &Snowflake, admin_ids: &BTreeSet<Snowflake>) -> bool {
    if admin_ids.is_empty() {
        return false;
    }
    let ids = BTreeSet::from([actor_id.clone()]);
    let policy = Policy {
        allow: admin_ids.clone(),
        deny: BTreeSet::new(),
    };
    resolve(&ids, &policy)
}
