//! Namespace query endpoint.
//!
//! Serves an OSCQuery-style JSON description of the tree over plain HTTP:
//! `GET /` answers the whole namespace, `GET /Channel-4/slider` a single
//! parameter. Read-only; value changes travel over the OSC endpoint.

use crate::tree::{AccessMode, BoundingMode, Domain, Node, Tree, ValType, Value};
use log::{debug, error, info, warn};
use serde_json::{json, Map, Value as Json};
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct QueryServer {
    listener: TcpListener,
    tree: Arc<Tree>,
    running: Arc<AtomicBool>,
}

impl QueryServer {
    pub fn bind(port: u16, tree: Arc<Tree>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        // Poll accept so `stop` is honored.
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            tree,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn start(&self) -> std::io::Result<()> {
        self.running.store(true, Ordering::SeqCst);
        let listener = self.listener.try_clone()?;
        let tree = Arc::clone(&self.tree);
        let running = Arc::clone(&self.running);
        thread::spawn(move || Self::serve(listener, tree, running));
        info!("namespace queries on http://{}", self.listener.local_addr()?);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn serve(listener: TcpListener, tree: Arc<Tree>, running: Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = Self::handle(stream, &tree) {
                        debug!("query connection failed: {e}");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    error!("namespace accept failed: {e}");
                    break;
                }
            }
        }
    }

    fn handle(stream: TcpStream, tree: &Tree) -> std::io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_secs(2)))?;
        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        // Drain the request headers so the close after the response is clean.
        let mut header = String::new();
        for _ in 0..64 {
            header.clear();
            let read = reader.read_line(&mut header)?;
            if read == 0 || header == "\r\n" || header == "\n" {
                break;
            }
        }

        let mut stream = reader.into_inner();
        let path = match parse_request_path(&request_line) {
            Some(path) => path,
            None => {
                warn!("malformed namespace request: {request_line:?}");
                return respond(&mut stream, 400, &json!({"ERROR": "bad request"}));
            }
        };

        match namespace(tree, &path) {
            Some(body) => respond(&mut stream, 200, &body),
            None => respond(&mut stream, 404, &json!({"ERROR": "no such node"})),
        }
    }
}

fn parse_request_path(request_line: &str) -> Option<String> {
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let path = parts.next()?;
    if !path.starts_with('/') {
        return None;
    }
    Some(path.trim_end_matches('/').to_string())
}

fn respond(stream: &mut TcpStream, status: u16, body: &Json) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Not Found",
    };
    let body = body.to_string();
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// JSON description of the node or container at `path`, or `None` if
/// nothing lives there.
pub(crate) fn namespace(tree: &Tree, path: &str) -> Option<Json> {
    if let Some(node) = tree.find(path) {
        return Some(node_json(&node));
    }
    let prefix = if path.is_empty() { "" } else { path };
    container_json(tree, prefix)
}

fn container_json(tree: &Tree, prefix: &str) -> Option<Json> {
    let mut contents = Map::new();
    for node in tree.nodes() {
        let Some(rest) = node.path().strip_prefix(prefix) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix('/') else {
            continue;
        };
        let segment = rest.split('/').next().unwrap_or(rest);
        if contents.contains_key(segment) {
            continue;
        }
        let child_path = format!("{prefix}/{segment}");
        let child = match tree.find(&child_path) {
            Some(child) => node_json(&child),
            None => container_json(tree, &child_path)?,
        };
        contents.insert(segment.to_string(), child);
    }
    if contents.is_empty() && !prefix.is_empty() {
        return None;
    }
    Some(json!({
        "FULL_PATH": if prefix.is_empty() { "/" } else { prefix },
        "CONTENTS": contents,
    }))
}

fn node_json(node: &Node) -> Json {
    let mut body = Map::new();
    body.insert("FULL_PATH".into(), json!(node.path()));
    body.insert("TYPE".into(), json!(type_tag(node.val_type())));
    body.insert("ACCESS".into(), json!(access_code(node.access())));
    body.insert("VALUE".into(), value_json(&node.value()));
    if let (BoundingMode::Clip, Domain::Range { min, max }) = (node.bounding(), node.domain()) {
        body.insert("RANGE".into(), json!([{ "MIN": min, "MAX": max }]));
    }
    Json::Object(body)
}

fn type_tag(val_type: ValType) -> &'static str {
    match val_type {
        ValType::Float => "f",
        ValType::Bool => "T",
        ValType::Str => "s",
    }
}

fn access_code(access: AccessMode) -> u8 {
    match access {
        AccessMode::Get => 1,
        AccessMode::Set => 2,
        AccessMode::Bi => 3,
    }
}

fn value_json(value: &Value) -> Json {
    match value {
        Value::Float(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::Str(v) => json!(v),
    }
}
