//! The exported AST table
//!
//! A pool is handed to downstream compilers as one JSON object keyed by node
//! id. NUM and STR leaves are written as bare JSON literals, every other node
//! as `{"tag": .., "elts": [..]}` where interior nodes list child ids. The
//! object also carries `root` and `version`.

use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::interner::Symbol;
use crate::language::{Node, NodeId, Tag};
use crate::numeric::Number;
use crate::pool::NodePool;

// Largest integer a double holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn number_to_json(n: Number) -> Value {
    let x = n.value();
    if n.is_integral() && x.abs() <= MAX_SAFE_INTEGER {
        return json!(x as i64);
    }
    match serde_json::Number::from_f64(x) {
        Some(number) => Value::Number(number),
        None => json!({ "tag": "NUM", "elts": [n.to_string()] }),
    }
}

pub fn node_to_json(node: &Node) -> Value {
    match node {
        Node::Num(n) => number_to_json(*n),
        Node::Str(s) => Value::String(s.clone()),
        Node::Ident(name) => json!({ "tag": "IDENT", "elts": [name.resolve()] }),
        Node::Bool(b) => json!({ "tag": "BOOL", "elts": [b] }),
        Node::Null => json!({ "tag": "NULL", "elts": [] }),
        Node::Branch { tag, elts } => {
            let elts: Vec<Value> = elts.iter().map(|id| json!(id.index())).collect();
            json!({ "tag": tag.name(), "elts": elts })
        }
    }
}

/// Serialize every node of the pool plus `root` and `version`.
pub fn export(pool: &NodePool, root: NodeId, version: &str) -> Value {
    let mut table = Map::new();
    for (id, node) in pool.iter() {
        table.insert(id.to_string(), node_to_json(node));
    }
    table.insert("root".to_string(), json!(root.index()));
    table.insert("version".to_string(), json!(version));
    Value::Object(table)
}

// ============================================================================
// Import
// ============================================================================

fn invalid(id: usize, what: &str) -> Error {
    Error::Import(format!("node {id}: {what}"))
}

fn scalar<'v>(id: usize, elts: &'v [Value]) -> Result<&'v Value> {
    elts.first().ok_or_else(|| invalid(id, "missing payload"))
}

fn json_to_node(id: usize, value: &Value, ids: &[NodeId]) -> Result<Node> {
    let object = match value {
        Value::Number(n) => {
            let x = n.as_f64().ok_or_else(|| invalid(id, "bad number"))?;
            return Ok(Node::Num(Number::new(x)));
        }
        Value::String(s) => return Ok(Node::Str(s.clone())),
        Value::Object(object) => object,
        _ => return Err(invalid(id, "expected a literal or a tagged node")),
    };
    let tag_name = object
        .get("tag")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(id, "missing tag"))?;
    let tag = Tag::from_name(tag_name).ok_or_else(|| invalid(id, "unknown tag"))?;
    let elts = object
        .get("elts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let node = match tag {
        Tag::Null => Node::Null,
        Tag::Bool => Node::Bool(
            scalar(id, elts)?
                .as_bool()
                .ok_or_else(|| invalid(id, "BOOL payload is not a boolean"))?,
        ),
        Tag::Ident => Node::Ident(Symbol::new(
            scalar(id, elts)?
                .as_str()
                .ok_or_else(|| invalid(id, "IDENT payload is not a string"))?,
        )),
        Tag::Str => Node::Str(
            scalar(id, elts)?
                .as_str()
                .ok_or_else(|| invalid(id, "STR payload is not a string"))?
                .to_string(),
        ),
        Tag::Num => match scalar(id, elts)? {
            Value::String(s) => Node::Num(Number::parse(s)),
            Value::Number(n) => Node::Num(Number::new(n.as_f64().unwrap_or(f64::NAN))),
            _ => return Err(invalid(id, "NUM payload is not a number")),
        },
        _ => {
            let children = elts
                .iter()
                .map(|elt| {
                    let child = elt
                        .as_u64()
                        .and_then(|child| usize::try_from(child).ok())
                        .ok_or_else(|| invalid(id, "child is not a node id"))?;
                    // Children are always interned before their parents.
                    if child == 0 || child >= id {
                        return Err(invalid(id, "child id out of range"));
                    }
                    Ok(ids[child])
                })
                .collect::<Result<Vec<_>>>()?;
            Node::branch(tag, children)
        }
    };
    Ok(node)
}

/// Rebuild a pool from an exported table. Returns the pool and the root id.
pub fn import(value: &Value) -> Result<(NodePool, NodeId)> {
    let table = value
        .as_object()
        .ok_or_else(|| Error::Import("expected a JSON object".into()))?;
    let mut entries: Vec<(usize, &Value)> = table
        .iter()
        .filter_map(|(key, node)| key.parse::<usize>().ok().map(|id| (id, node)))
        .collect();
    entries.sort_by_key(|(id, _)| *id);

    let mut pool = NodePool::new();
    // Exported id -> id in the rebuilt pool
    let mut ids = vec![NodeId::NONE];
    for (expected, (id, node)) in (1..).zip(entries) {
        if id != expected {
            return Err(Error::Import(format!("node ids are not dense at {id}")));
        }
        let node = json_to_node(id, node, &ids)?;
        ids.push(pool.intern(node));
    }

    let root = table
        .get("root")
        .and_then(Value::as_u64)
        .and_then(|root| usize::try_from(root).ok())
        .ok_or_else(|| Error::Import("missing root".into()))?;
    let root = ids
        .get(root)
        .copied()
        .ok_or_else(|| Error::Import(format!("root {root} is not in the table")))?;
    Ok((pool, root))
}
