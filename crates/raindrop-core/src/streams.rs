//! Named, subscribable streams and their local policies.
//!
//! Operations here are pure state transitions; authorization happens in
//! `service` before any of them is called.

use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{domain::Snowflake, errors::Error, security::Policy, utils::flag, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(with = "flag::lenient", default)]
    pub locked: bool,
    #[serde(rename = "origin_server")]
    origin_group_id: Snowflake,
    #[serde(rename = "channels", default)]
    pub subscriber_channels: BTreeSet<Snowflake>,
    #[serde(flatten)]
    pub policy: Policy,
}

impl StreamRecord {
    /// A fresh stream: unlocked, no subscribers, modifiable from its origin group.
    pub fn new(origin_group_id: Snowflake) -> Self {
        Self {
            locked: false,
            policy: Policy::allowing([origin_group_id.clone()]),
            origin_group_id,
            subscriber_channels: BTreeSet::new(),
        }
    }

    pub fn origin_group_id(&self) -> &Snowflake {
        &self.origin_group_id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamRegistry {
    streams: BTreeMap<String, StreamRecord>,
}

impl StreamRegistry {
    pub fn get(&self, name: &str) -> Option<&StreamRecord> {
        self.streams.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.streams.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams `channel` is subscribed to, by name.
    pub fn subscriptions_of(&self, channel: &Snowflake) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|(_, s)| s.subscriber_channels.contains(channel))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn create(&mut self, name: &str, origin_group_id: Snowflake) -> Result<&StreamRecord> {
        match self.streams.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!(
                "'{name}' already exists. Streams must have a unique name."
            ))),
            Entry::Vacant(v) => Ok(v.insert(StreamRecord::new(origin_group_id))),
        }
    }

    pub fn delete(&mut self, name: &str) -> Result<StreamRecord> {
        self.streams.remove(name).ok_or_else(|| missing(name))
    }

    pub fn subscribe(&mut self, name: &str, channel: Snowflake) -> Result<()> {
        let stream = self.get_mut(name)?;
        if stream.subscriber_channels.contains(&channel) {
            return Err(Error::AlreadyExists(format!(
                "'{channel}' is already subscribed to '{name}'."
            )));
        }
        stream.subscriber_channels.insert(channel);
        Ok(())
    }

    pub fn unsubscribe(&mut self, name: &str, channel: &Snowflake) -> Result<()> {
        let stream = self.get_mut(name)?;
        if !stream.subscriber_channels.remove(channel) {
            return Err(Error::NotFound(format!(
                "'{channel}' is not subscribed to '{name}'."
            )));
        }
        Ok(())
    }

    pub fn authorize(&mut self, name: &str, id: Snowflake) -> Result<()> {
        let stream = self.get_mut(name)?;
        if stream.policy.allow.contains(&id) {
            return Err(Error::AlreadyExists(format!(
                "'{id}' is already authorized to modify '{name}'."
            )));
        }
        stream.policy.allow.insert(id);
        Ok(())
    }

    /// Removing the origin group is allowed, even when it leaves the stream
    /// modifiable only by admins.
    pub fn unauthorize(&mut self, name: &str, id: &Snowflake) -> Result<()> {
        let stream = self.get_mut(name)?;
        if !stream.policy.allow.remove(id) {
            return Err(Error::NotFound(format!(
                "'{id}' is already not authorized to modify '{name}'."
            )));
        }
        Ok(())
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut StreamRecord> {
        self.streams.get_mut(name).ok_or_else(|| missing(name))
    }
}

fn missing(name: &str) -> Error {
    Error::NotFound(format!("'{name}' does not exist."))
}
