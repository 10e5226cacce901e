//! Read-only queries against the master.
//!
//! Each helper shapes the positional arguments, runs the call through
//! [`MasterClient::execute`] and decodes the payload. The liveness check never
//! waits for the master; the listings always do.

use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::error::CallError;
use crate::executor::MasterClient;
use crate::pool::TransportPool;
use crate::validate::ResponseValidator;

const GET_PID: &str = "getPid";
const GET_PUBLISHED_TOPICS: &str = "getPublishedTopics";
const GET_SYSTEM_STATE: &str = "getSystemState";

/// A published topic and its message type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicInfo {
    pub name: String,
    pub datatype: String,
}

impl TopicInfo {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            datatype: datatype.into(),
        }
    }
}

impl<P, V> MasterClient<P, V>
where
    P: TransportPool,
    V: ResponseValidator,
{
    /// Whether the master answers right now.
    ///
    /// A single attempt, no waiting.
    pub fn check(&self) -> bool {
        self.execute(GET_PID, vec![json!(self.caller_id())], false)
            .is_ok()
    }

    /// Topics currently published, as `(name, type)` pairs.
    ///
    /// An empty list just means nothing is published yet.
    pub fn get_topics(&self) -> Result<Vec<TopicInfo>, CallError> {
        // Empty subgraph: all topics
        let outcome = self.execute(
            GET_PUBLISHED_TOPICS,
            vec![json!(self.caller_id()), json!("")],
            true,
        )?;

        parse_topics(&outcome.payload).map_err(|reason| invalid(GET_PUBLISHED_TOPICS, reason))
    }

    /// Names of every node that publishes, subscribes or provides a service.
    pub fn get_nodes(&self) -> Result<BTreeSet<String>, CallError> {
        let outcome = self.execute(GET_SYSTEM_STATE, vec![json!(self.caller_id())], true)?;

        collect_node_names(&outcome.payload).map_err(|reason| invalid(GET_SYSTEM_STATE, reason))
    }
}

fn invalid(method: &str, reason: String) -> CallError {
    CallError::InvalidResponse {
        method: method.to_string(),
        reason,
    }
}

fn as_list<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| format!("{} is not a list: {}", what, value))
}

fn as_string<'a>(value: &'a Value, what: &str) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("{} is not a string: {}", what, value))
}

/// Decodes `[[name, type], ...]`.
fn parse_topics(payload: &Value) -> Result<Vec<TopicInfo>, String> {
    as_list(payload, "topic list")?
        .iter()
        .map(|entry| match as_list(entry, "topic entry")?.as_slice() {
            [name, datatype, ..] => Ok(TopicInfo::new(
                as_string(name, "topic name")?,
                as_string(datatype, "topic type")?,
            )),
            _ => Err(format!("topic entry needs a name and a type: {}", entry)),
        })
        .collect()
}

/// Flattens `[publishers, subscribers, services]`, each a list of
/// `[name, [participant, ...]]`, into the set of participant names.
fn collect_node_names(payload: &Value) -> Result<BTreeSet<String>, String> {
    let mut nodes = BTreeSet::new();

    for category in as_list(payload, "system state")? {
        for entry in as_list(category, "system state category")? {
            let participants = match as_list(entry, "system state entry")?.as_slice() {
                [_, participants, ..] => as_list(participants, "participant list")?,
                _ => return Err(format!("system state entry needs a name and participants: {}", entry)),
            };

            for participant in participants {
                nodes.insert(as_string(participant, "participant")?.to_string());
            }
        }
    }

    Ok(nodes)
}
