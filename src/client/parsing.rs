//! Parsers for the line-oriented replies read through the command tunnel
//! or a forwarded wire connection.
//!
//! All functions here are pure: the same input always produces the same
//! output, and a malformed reply fails the whole call rather than
//! yielding a partial result.

use std::collections::HashMap;

use fred::types::Value;
use serde::Serialize;

use super::types::{ParseError, SlotSpan, parse_slot};

/// Parse key-value pairs from `INFO`-style output.
///
/// Lines look like `key:value`; section headers (`# Replication`) and
/// lines without a `:` are skipped. Only the first `:` separates the key,
/// so values such as `slave0:ip=10.0.0.2,port=6379` are kept whole.
pub fn parse_info_output(info: &str) -> HashMap<String, String> {
    info.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Replication status read from `INFO REPLICATION`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplicationInfo {
    /// Role ("master" or "slave").
    pub role: Option<String>,
    /// Master link status ("up" or "down"), replicas only.
    pub master_link_status: Option<String>,
    /// Seconds since the last interaction with the master, replicas only.
    pub master_last_io_seconds_ago: Option<i64>,
    /// Whether a full sync with the master is in progress.
    pub master_sync_in_progress: Option<bool>,
    /// Number of connected replicas, masters only.
    pub connected_slaves: Option<u32>,
    /// Replication offset of this node's stream. On a replica this mirrors
    /// `slave_repl_offset`, not the master's current offset.
    pub master_repl_offset: Option<i64>,
    /// Offset a replica has processed, replicas only.
    pub slave_repl_offset: Option<i64>,
}

impl ReplicationInfo {
    /// Parse from `INFO REPLICATION` output.
    pub fn parse(info: &str) -> Self {
        Self::from_fields(&parse_info_output(info))
    }

    /// Build from an already parsed INFO dictionary.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let number = |key: &str| fields.get(key).and_then(|v| v.parse().ok());

        ReplicationInfo {
            role: fields.get("role").cloned(),
            master_link_status: fields.get("master_link_status").cloned(),
            master_last_io_seconds_ago: number("master_last_io_seconds_ago"),
            master_sync_in_progress: fields
                .get("master_sync_in_progress")
                .map(|v| v.as_str() != "0"),
            connected_slaves: fields.get("connected_slaves").and_then(|v| v.parse().ok()),
            master_repl_offset: number("master_repl_offset"),
            slave_repl_offset: number("slave_repl_offset"),
        }
    }

    /// Whether the node reports itself as a replica.
    pub fn is_slave(&self) -> bool {
        self.role.as_deref() == Some("slave")
    }
}

/// Convert a Sentinel reply into one dictionary per entry.
///
/// `SENTINEL MASTERS` and `SENTINEL SLAVES <name>` both answer with an
/// array of flat arrays of alternating keys and values.
pub fn parse_keyed_pairs(reply: &Value) -> Result<Vec<HashMap<String, String>>, ParseError> {
    let Value::Array(entries) = reply else {
        return Err(ParseError::InvalidSentinelReply(format!(
            "expected an array of entries, got {:?}",
            reply.kind()
        )));
    };
    entries.iter().map(parse_keyed_entry).collect()
}

/// Convert a single flat key/value array, as returned by
/// `SENTINEL MASTER <name>`, into a dictionary.
pub fn parse_keyed_entry(entry: &Value) -> Result<HashMap<String, String>, ParseError> {
    let Value::Array(items) = entry else {
        return Err(ParseError::InvalidSentinelReply(format!(
            "expected a key/value array, got {:?}",
            entry.kind()
        )));
    };
    if items.len() % 2 != 0 {
        return Err(ParseError::InvalidSentinelReply(format!(
            "odd number of key/value items: {}",
            items.len()
        )));
    }

    let text = |value: &Value| {
        value.as_string().ok_or_else(|| {
            ParseError::InvalidSentinelReply(format!("non-string item {:?}", value.kind()))
        })
    };

    items
        .chunks_exact(2)
        .map(|pair| match pair {
            [key, value] => Ok((text(key)?, text(value)?)),
            _ => Err(ParseError::InvalidSentinelReply("truncated pair".to_string())),
        })
        .collect()
}

/// One `(ip, port, node-id)` triplet of a `CLUSTER SLOTS` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEndpoint {
    pub ip: String,
    pub port: u16,
    pub node_id: String,
}

/// One group of `CLUSTER SLOTS`: a slot range, its master and replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotGroup {
    pub span: SlotSpan,
    pub master: SlotEndpoint,
    pub replicas: Vec<SlotEndpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    /// A numeric token, opening a new range.
    Slot,
    /// An IP-shaped token, opening an endpoint triplet.
    Address,
    Other,
}

fn classify(token: &str) -> TokenKind {
    if token.contains('.') || token.contains(':') {
        TokenKind::Address
    } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        TokenKind::Slot
    } else {
        TokenKind::Other
    }
}

enum SlotParseState {
    AwaitingGroup,
    HaveMaster(SlotGroup),
}

/// Parse the flattened `redis-cli --raw CLUSTER SLOTS` output.
///
/// The token stream repeats `start, end, ip, port, id, (ip, port, id)*`.
/// The first triplet after a range is its master; every following
/// IP-shaped triplet is a replica of the most recently opened range.
/// The stream must end on a group boundary; an empty stream yields no
/// groups.
pub fn parse_cluster_slots(output: &str) -> Result<Vec<SlotGroup>, ParseError> {
    let mut tokens = output
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .peekable();

    let mut groups = Vec::new();
    let mut state = SlotParseState::AwaitingGroup;

    loop {
        state = match state {
            SlotParseState::AwaitingGroup => {
                let Some(first) = tokens.next() else {
                    break;
                };
                let start = parse_slot(first)?;
                let end = parse_slot(next_token(&mut tokens, "range end")?)?;
                if start > end {
                    return Err(ParseError::InvalidClusterSlots(format!(
                        "range {}-{} starts after it ends",
                        start, end
                    )));
                }
                let master = read_endpoint(&mut tokens)?;
                SlotParseState::HaveMaster(SlotGroup {
                    span: SlotSpan::new(start, end),
                    master,
                    replicas: Vec::new(),
                })
            }
            SlotParseState::HaveMaster(mut group) => match tokens.peek().map(|t| classify(t)) {
                None => {
                    groups.push(group);
                    break;
                }
                Some(TokenKind::Address) => {
                    group.replicas.push(read_endpoint(&mut tokens)?);
                    SlotParseState::HaveMaster(group)
                }
                Some(TokenKind::Slot) => {
                    groups.push(group);
                    SlotParseState::AwaitingGroup
                }
                Some(TokenKind::Other) => {
                    return Err(ParseError::InvalidClusterSlots(format!(
                        "unexpected token {:?} after range {}",
                        tokens.peek().copied().unwrap_or_default(),
                        group.span
                    )));
                }
            },
        };
    }

    Ok(groups)
}

fn next_token<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<&'a str, ParseError> {
    tokens
        .next()
        .ok_or_else(|| ParseError::InvalidClusterSlots(format!("stream ended before {}", what)))
}

fn read_endpoint<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<SlotEndpoint, ParseError> {
    let ip = next_token(tokens, "node ip")?;
    if classify(ip) != TokenKind::Address {
        return Err(ParseError::InvalidClusterSlots(format!(
            "expected an ip, got {:?}",
            ip
        )));
    }
    let port_token = next_token(tokens, "node port")?;
    let port = port_token.parse().map_err(|_| {
        ParseError::InvalidClusterSlots(format!("invalid port {:?} for {}", port_token, ip))
    })?;
    let node_id = next_token(tokens, "node id")?;

    Ok(SlotEndpoint {
        ip: ip.to_string(),
        port,
        node_id: node_id.to_string(),
    })
}
