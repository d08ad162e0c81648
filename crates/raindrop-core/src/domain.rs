use std::{borrow::Borrow, collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

/// Opaque platform-assigned id (user, chat, role, group).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub String);

impl Snowflake {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Snowflake {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Snowflake {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Snowflake {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Narrow view of an incoming request, implemented by platform adapters.
pub trait RequestContext {
    fn actor_id(&self) -> Snowflake;
    fn location_id(&self) -> Snowflake;
    fn role_ids(&self) -> Vec<Snowflake>;
    fn group_id(&self) -> Snowflake;
}

/// Who is asking, and from where. Derived per request, never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub actor_id: Snowflake,
    pub location_id: Snowflake,
    pub role_ids: Vec<Snowflake>,
    pub group_id: Snowflake,
}

impl Identity {
    pub fn from_context(ctx: &impl RequestContext) -> Self {
        Self {
            actor_id: ctx.actor_id(),
            location_id: ctx.location_id(),
            role_ids: ctx.role_ids(),
            group_id: ctx.group_id(),
        }
    }

    /// `role_ids ∪ {actor_id, location_id, group_id}`.
    pub fn id_set(&self) -> BTreeSet<Snowflake> {
        let mut ids: BTreeSet<Snowflake> = self.role_ids.iter().cloned().collect();
        ids.insert(self.actor_id.clone());
        ids.insert(self.location_id.clone());
        ids.insert(self.group_id.clone());
        ids
    }
}
