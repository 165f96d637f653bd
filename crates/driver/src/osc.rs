//! OSC endpoint for the parameter tree.
//!
//! Inbound messages address nodes by path. With arguments they are remote
//! writes; without, they are queries answered back to the sender. Every
//! peer that has sent us a packet receives value-change feedback for all
//! subsequent tree changes.

use crate::tree::{DeviceProtocol, Tree, ValType, Value};
use log::{debug, error, info, warn};
use rosc::{OscMessage, OscPacket, OscType};
use std::collections::HashSet;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub struct OscServer {
    socket: UdpSocket,
    tree: Arc<Tree>,
    protocol: Arc<dyn DeviceProtocol>,
    peers: Arc<Mutex<HashSet<SocketAddr>>>,
    running: Arc<AtomicBool>,
}

impl OscServer {
    pub fn bind(
        port: u16,
        tree: Arc<Tree>,
        protocol: Arc<dyn DeviceProtocol>,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))?;
        // Wake the receive loop periodically so `stop` is honored.
        socket.set_read_timeout(Some(Duration::from_millis(100)))?;
        Ok(Self {
            socket,
            tree,
            protocol,
            peers: Arc::new(Mutex::new(HashSet::new())),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Install the tree feedback hook and start the receive thread.
    pub fn start(&self) -> io::Result<()> {
        self.running.store(true, Ordering::SeqCst);

        let feedback_socket = self.socket.try_clone()?;
        let feedback_peers = Arc::clone(&self.peers);
        self.tree.set_broadcast(move |path, value| {
            let packet = OscPacket::Message(OscMessage {
                addr: path.to_string(),
                args: vec![to_osc(value)],
            });
            let Ok(buf) = rosc::encoder::encode(&packet) else {
                return;
            };
            for peer in feedback_peers.lock().unwrap().iter() {
                if let Err(e) = feedback_socket.send_to(&buf, peer) {
                    debug!("feedback to {peer} failed: {e}");
                }
            }
        });

        let socket = self.socket.try_clone()?;
        let tree = Arc::clone(&self.tree);
        let protocol = Arc::clone(&self.protocol);
        let peers = Arc::clone(&self.peers);
        let running = Arc::clone(&self.running);
        thread::spawn(move || Self::serve(socket, tree, protocol, peers, running));

        info!("OSC endpoint listening on {}", self.socket.local_addr()?);
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn serve(
        socket: UdpSocket,
        tree: Arc<Tree>,
        protocol: Arc<dyn DeviceProtocol>,
        peers: Arc<Mutex<HashSet<SocketAddr>>>,
        running: Arc<AtomicBool>,
    ) {
        let mut buf = [0u8; 65536];
        while running.load(Ordering::SeqCst) {
            match socket.recv_from(&mut buf) {
                Ok((size, from)) => {
                    peers.lock().unwrap().insert(from);
                    match rosc::decoder::decode_udp(&buf[..size]) {
                        Ok((_, packet)) => {
                            Self::handle_packet(&socket, &tree, &protocol, packet, from);
                        }
                        Err(e) => warn!("undecodable OSC packet from {from}: {e:?}"),
                    }
                }
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    error!("OSC receive failed: {e}");
                    break;
                }
            }
        }
    }

    fn handle_packet(
        socket: &UdpSocket,
        tree: &Tree,
        protocol: &Arc<dyn DeviceProtocol>,
        packet: OscPacket,
        from: SocketAddr,
    ) {
        match packet {
            OscPacket::Message(msg) => Self::handle_message(socket, tree, protocol, msg, from),
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    Self::handle_packet(socket, tree, protocol, inner, from);
                }
            }
        }
    }

    fn handle_message(
        socket: &UdpSocket,
        tree: &Tree,
        protocol: &Arc<dyn DeviceProtocol>,
        msg: OscMessage,
        from: SocketAddr,
    ) {
        match tree.find(&msg.addr) {
            Some(node) if msg.args.is_empty() => {
                // Query: pull is a contractual no-op here, the cached value
                // is always current for an event-driven surface.
                protocol.pull(&node);
                let reply = OscPacket::Message(OscMessage {
                    addr: node.path().to_string(),
                    args: vec![to_osc(&node.value())],
                });
                match rosc::encoder::encode(&reply) {
                    Ok(buf) => {
                        if let Err(e) = socket.send_to(&buf, from) {
                            debug!("query reply to {from} failed: {e}");
                        }
                    }
                    Err(e) => warn!("could not encode reply for {}: {e:?}", node.path()),
                }
            }
            Some(node) => match coerce(node.val_type(), &msg.args[0]) {
                Some(value) => {
                    if let Err(e) = node.remote_push(value) {
                        debug!("rejected write from {from}: {e}");
                    }
                }
                None => warn!(
                    "argument {:?} does not fit {} ({:?})",
                    msg.args[0],
                    node.path(),
                    node.val_type()
                ),
            },
            None => {
                let Some(value) = msg.args.first().and_then(osc_value) else {
                    debug!("query for unknown node {}", msg.addr);
                    return;
                };
                if !protocol.push_raw(&msg.addr, &value) {
                    debug!("dropped write for unknown node {}", msg.addr);
                }
            }
        }
    }
}

fn to_osc(value: &Value) -> OscType {
    match value {
        Value::Float(v) => OscType::Float(*v),
        Value::Bool(v) => OscType::Bool(*v),
        Value::Str(v) => OscType::String(v.clone()),
    }
}

/// Coerce an OSC argument to the node's value type; senders are loose about
/// int/float/bool tags.
fn coerce(val_type: ValType, arg: &OscType) -> Option<Value> {
    match (val_type, arg) {
        (ValType::Float, OscType::Float(v)) => Some(Value::Float(*v)),
        (ValType::Float, OscType::Double(v)) => Some(Value::Float(*v as f32)),
        (ValType::Float, OscType::Int(v)) => Some(Value::Float(*v as f32)),
        (ValType::Bool, OscType::Bool(v)) => Some(Value::Bool(*v)),
        (ValType::Bool, OscType::Int(v)) => Some(Value::Bool(*v != 0)),
        (ValType::Bool, OscType::Float(v)) => Some(Value::Bool(*v != 0.0)),
        (ValType::Str, OscType::String(v)) => Some(Value::Str(v.clone())),
        _ => None,
    }
}

/// Best-effort mapping for arguments addressed at nodes the tree does not
/// know, handed to the raw-push shim.
fn osc_value(arg: &OscType) -> Option<Value> {
    match arg {
        OscType::Float(v) => Some(Value::Float(*v)),
        OscType::Double(v) => Some(Value::Float(*v as f32)),
        OscType::Int(v) => Some(Value::Float(*v as f32)),
        OscType::Bool(v) => Some(Value::Bool(*v)),
        OscType::String(v) => Some(Value::Str(v.clone())),
        _ => None,
    }
}
