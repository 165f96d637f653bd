//! Path-addressed parameter tree.
//!
//! Nodes hold a typed value plus the access/domain/bounding policy declared
//! at creation time. Two observer channels hang off the tree: a per-node
//! device hook (the hardware push installed when a surface parameter is
//! constructed) and a tree-wide broadcast (network feedback). A value pushed
//! from the network side runs both; a value pushed from the device side
//! skips the device hook, because the physical control already shows it.

use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn val_type(&self) -> ValType {
        match self {
            Value::Float(_) => ValType::Float,
            Value::Bool(_) => ValType::Bool,
            Value::Str(_) => ValType::Str,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValType {
    Float,
    Bool,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Network clients may only observe the value.
    Get,
    /// Network clients may only write the value.
    Set,
    /// Readable and writable.
    Bi,
}

impl AccessMode {
    pub fn remote_writable(self) -> bool {
        matches!(self, AccessMode::Set | AccessMode::Bi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundingMode {
    Free,
    Clip,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Domain {
    Unbounded,
    Range { min: f32, max: f32 },
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("a node already exists at {0}")]
    DuplicateNode(String),
    #[error("invalid node path {0:?}")]
    InvalidPath(String),
    #[error("node {0} does not accept remote writes")]
    NotWritable(String),
    #[error("node {path} holds {expected:?} values")]
    TypeMismatch { path: String, expected: ValType },
}

/// Device-protocol contract the tree host expects from a bound device.
///
/// For an event-driven surface these are mostly degenerate: the reactive
/// per-node hooks do the real work, and the shim only reports whether an
/// operation is meaningful for this hardware class.
pub trait DeviceProtocol: Send + Sync {
    /// Request a fresh read of a parameter from the device.
    fn pull(&self, node: &Node) -> bool;
    /// Acknowledge a value pushed through the tree.
    fn push(&self, node: &Node, value: &Value) -> bool;
    /// Enable or disable device-side observation of a parameter.
    fn observe(&self, node: &Node, enable: bool) -> bool;
    /// Push a value for a parameter the tree does not know.
    fn push_raw(&self, path: &str, value: &Value) -> bool;
}

type DeviceHook = Box<dyn Fn(&Value) + Send + Sync>;
type BroadcastHook = Box<dyn Fn(&str, &Value) + Send + Sync>;

struct Hooks {
    broadcast: RwLock<Option<BroadcastHook>>,
    protocol: RwLock<Option<Arc<dyn DeviceProtocol>>>,
}

pub struct Node {
    path: String,
    val_type: ValType,
    access: AccessMode,
    bounding: BoundingMode,
    domain: Domain,
    value: Mutex<Value>,
    device_hook: Mutex<Option<DeviceHook>>,
    hooks: Arc<Hooks>,
}

impl Node {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn val_type(&self) -> ValType {
        self.val_type
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn bounding(&self) -> BoundingMode {
        self.bounding
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn value(&self) -> Value {
        self.value.lock().unwrap().clone()
    }

    /// Install the hardware push run on every tree-originated change.
    /// The hook must stay non-blocking; it runs on whichever context pushed.
    pub fn set_device_hook(&self, hook: impl Fn(&Value) + Send + Sync + 'static) {
        *self.device_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Full push: bound, store, drive the hardware, notify the network.
    pub fn push(&self, value: Value) {
        let value = self.bound(value);
        *self.value.lock().unwrap() = value.clone();
        if let Some(hook) = self.device_hook.lock().unwrap().as_ref() {
            hook(&value);
        }
        self.notify(&value);
    }

    /// Push for a value the physical control itself produced: the hardware
    /// already shows it, so only the network side is notified.
    pub fn push_from_device(&self, value: Value) {
        let value = self.bound(value);
        *self.value.lock().unwrap() = value.clone();
        self.notify(&value);
    }

    /// Network entry point: enforces the access mode and value type before
    /// delegating to [`Node::push`].
    pub fn remote_push(&self, value: Value) -> Result<(), TreeError> {
        if !self.access.remote_writable() {
            return Err(TreeError::NotWritable(self.path.clone()));
        }
        if value.val_type() != self.val_type {
            return Err(TreeError::TypeMismatch {
                path: self.path.clone(),
                expected: self.val_type,
            });
        }
        self.push(value);
        Ok(())
    }

    fn bound(&self, value: Value) -> Value {
        match (self.bounding, self.domain, &value) {
            (BoundingMode::Clip, Domain::Range { min, max }, Value::Float(v)) => {
                Value::Float(v.clamp(min, max))
            }
            _ => value,
        }
    }

    fn notify(&self, value: &Value) {
        if let Some(broadcast) = self.hooks.broadcast.read().unwrap().as_ref() {
            broadcast(&self.path, value);
        }
        if let Some(protocol) = self.hooks.protocol.read().unwrap().as_ref() {
            if !protocol.push(self, value) {
                debug!("device protocol refused push for {}", self.path);
            }
        }
    }
}

pub struct Tree {
    nodes: RwLock<BTreeMap<String, Arc<Node>>>,
    hooks: Arc<Hooks>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            hooks: Arc::new(Hooks {
                broadcast: RwLock::new(None),
                protocol: RwLock::new(None),
            }),
        }
    }

    /// Create a node; the value type is taken from the initial value.
    pub fn create(
        &self,
        path: &str,
        initial: Value,
        access: AccessMode,
        bounding: BoundingMode,
        domain: Domain,
    ) -> Result<Arc<Node>, TreeError> {
        let path = normalize_path(path)?;
        let mut nodes = self.nodes.write().unwrap();
        if nodes.contains_key(&path) {
            return Err(TreeError::DuplicateNode(path));
        }
        let node = Arc::new(Node {
            path: path.clone(),
            val_type: initial.val_type(),
            access,
            bounding,
            domain,
            value: Mutex::new(initial),
            device_hook: Mutex::new(None),
            hooks: Arc::clone(&self.hooks),
        });
        nodes.insert(path, Arc::clone(&node));
        Ok(node)
    }

    pub fn find(&self, path: &str) -> Option<Arc<Node>> {
        let path = normalize_path(path).ok()?;
        self.nodes.read().unwrap().get(&path).cloned()
    }

    /// All nodes in path order.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.read().unwrap().values().cloned().collect()
    }

    pub fn set_broadcast(&self, hook: impl Fn(&str, &Value) + Send + Sync + 'static) {
        *self.hooks.broadcast.write().unwrap() = Some(Box::new(hook));
    }

    pub fn set_device_protocol(&self, protocol: Arc<dyn DeviceProtocol>) {
        *self.hooks.protocol.write().unwrap() = Some(protocol);
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_path(path: &str) -> Result<String, TreeError> {
    if !path.starts_with('/') || path.len() < 2 {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(path.trim_end_matches('/').to_string())
}
