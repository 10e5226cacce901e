// Copyright 2025 RVMaster Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Argument decoding and plain-text rendering for the CLI.

use anyhow::Result;
use rvmaster_client::TopicInfo;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Builds the override map the client resolves its configuration from.
pub fn overrides(master: Option<&str>, name: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(master) = master {
        map.insert(rvmaster_client::MASTER_REMAP_KEY.to_string(), master.to_string());
    }
    if let Some(name) = name {
        map.insert(rvmaster_client::NAME_REMAP_KEY.to_string(), name.to_string());
    }
    map
}

/// Decodes each `-a` argument as JSON.
///
/// Bare words that are not valid JSON are taken as strings, so
/// `-a /chatter` works without shell-quoting.
pub fn parse_call_args(args: &[String]) -> Result<Vec<Value>> {
    args.iter()
        .map(|raw| match serde_json::from_str(raw) {
            Ok(value) => Ok(value),
            Err(_) if looks_like_word(raw) => Ok(Value::String(raw.clone())),
            Err(e) => Err(anyhow::anyhow!("Invalid JSON argument '{}': {}", raw, e)),
        })
        .collect()
}

fn looks_like_word(raw: &str) -> bool {
    !raw.is_empty()
        && !raw.starts_with(['{', '[', '"'])
        && !raw.chars().any(char::is_whitespace)
}

/// One `name type` line per topic, names padded to a common width.
pub fn format_topics(topics: &[TopicInfo]) -> String {
    let width = topics.iter().map(|t| t.name.len()).max().unwrap_or(0);
    topics
        .iter()
        .map(|t| format!("{:<width$}  {}\n", t.name, t.datatype, width = width))
        .collect()
}

/// One node name per line, sorted.
pub fn format_nodes(nodes: &BTreeSet<String>) -> String {
    nodes.iter().map(|n| format!("{}\n", n)).collect()
}
