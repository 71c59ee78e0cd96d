//! CDP Transport Layer
//!
//! Launches the browser process, performs the WebSocket handshake on the
//! DevTools endpoint it prints, and multiplexes commands over that socket.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use super::types::Command;
use crate::error::{Error, Result};

/// Longest wait for the reply to a single command
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

type Reply = Result<Value>;
type Pending = Arc<Mutex<Inflight>>;

/// Calls awaiting a reply, keyed by id
#[derive(Default)]
struct Inflight {
    waiters: HashMap<u64, oneshot::Sender<Reply>>,
    closed: bool,
}

impl Inflight {
    /// Fails once the socket is gone, so no waiter is left behind the final drain
    fn register(&mut self, id: u64, tx: oneshot::Sender<Reply>) -> Result<()> {
        if self.closed {
            return Err(Error::transport("DevTools connection closed"));
        }
        self.waiters.insert(id, tx);
        Ok(())
    }

    fn resolve(&mut self, id: u64, reply: Reply) {
        if let Some(tx) = self.waiters.remove(&id) {
            let _ = tx.send(reply);
        }
    }

    fn forget(&mut self, id: u64) {
        self.waiters.remove(&id);
    }

    fn close(&mut self) {
        self.closed = true;
        for (_, tx) in self.waiters.drain() {
            let _ = tx.send(Err(Error::transport("DevTools connection closed")));
        }
    }
}

/// Wait at most `timeout` for the reply to `method`
async fn await_reply(
    rx: oneshot::Receiver<Reply>,
    method: &str,
    timeout: Duration,
) -> Result<Value> {
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(_)) => Err(Error::transport("DevTools connection closed")),
        Err(_) => Err(Error::Timeout(format!(
            "{} got no reply within {}ms",
            method,
            timeout.as_millis()
        ))),
    }
}

/// Minimal RFC 6455 client framing (text frames, close, ping/pong)
pub(crate) mod ws {
    use std::io::{self, Read};

    pub const OPCODE_TEXT: u8 = 0x1;
    pub const OPCODE_CLOSE: u8 = 0x8;
    pub const OPCODE_PING: u8 = 0x9;
    pub const OPCODE_PONG: u8 = 0xA;

    /// A decoded frame
    #[derive(Debug)]
    pub struct Frame {
        pub opcode: u8,
        pub payload: Vec<u8>,
    }

    /// Encode a client frame; clients must mask every payload
    pub fn encode(opcode: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
        let len = payload.len();
        let mut out = Vec::with_capacity(len + 14);
        out.push(0x80 | opcode);

        match len {
            0..=125 => out.push(0x80 | len as u8),
            126..=65535 => {
                out.push(0x80 | 126);
                out.extend_from_slice(&(len as u16).to_be_bytes());
            }
            _ => {
                out.push(0x80 | 127);
                out.extend_from_slice(&(len as u64).to_be_bytes());
            }
        }

        out.extend_from_slice(&mask);
        out.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
        out
    }

    /// Read one frame, unmasking it if the peer masked it
    pub fn read<R: Read>(reader: &mut R) -> io::Result<Frame> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;

        let opcode = head[0] & 0x0F;
        let masked = head[1] & 0x80 != 0;
        let len = match head[1] & 0x7F {
            126 => {
                let mut ext = [0u8; 2];
                reader.read_exact(&mut ext)?;
                u16::from_be_bytes(ext) as usize
            }
            127 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                u64::from_be_bytes(ext) as usize
            }
            n => n as usize,
        };

        let mask = if masked {
            let mut m = [0u8; 4];
            reader.read_exact(&mut m)?;
            Some(m)
        } else {
            None
        };

        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        if let Some(mask) = mask {
            payload
                .iter_mut()
                .enumerate()
                .for_each(|(i, b)| *b ^= mask[i % 4]);
        }

        Ok(Frame { opcode, payload })
    }
}

/// Split `ws://host:port/path` into `(host:port, /path)`
fn split_ws_url(ws_url: &str) -> Result<(&str, String)> {
    let rest = ws_url
        .strip_prefix("ws://")
        .ok_or_else(|| Error::transport(format!("Unsupported DevTools URL: {}", ws_url)))?;
    Ok(match rest.split_once('/') {
        Some((host, path)) => (host, format!("/{}", path)),
        None => (rest, "/".to_string()),
    })
}

/// CDP Transport - owns the browser process and the DevTools socket
pub struct Transport {
    child: Mutex<Child>,
    writer: Mutex<TcpStream>,
    next_id: AtomicU64,
    pending: Pending,
}

impl Transport {
    /// Connect to the DevTools WebSocket of an already launched browser
    pub fn connect(child: Child, ws_url: &str) -> Result<Self> {
        let (host, path) = split_ws_url(ws_url)?;

        let mut stream = TcpStream::connect(host)
            .map_err(|e| Error::transport_io("Failed to connect to DevTools", e))?;

        let key = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            rand::random::<[u8; 16]>(),
        );
        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {key}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n"
        );
        stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::transport_io("Handshake write failed", e))?;

        let mut buf = [0u8; 1024];
        let n = stream
            .read(&mut buf)
            .map_err(|e| Error::transport_io("Handshake read failed", e))?;
        let reply = String::from_utf8_lossy(&buf[..n]);
        if !reply.starts_with("HTTP/1.1 101") {
            return Err(Error::transport(format!(
                "WebSocket handshake rejected: {}",
                reply.lines().next().unwrap_or_default()
            )));
        }
        tracing::debug!("DevTools socket connected: {}", ws_url);

        let reader = stream
            .try_clone()
            .map_err(|e| Error::transport_io("Failed to clone socket", e))?;
        let pending: Pending = Arc::default();
        let pending_reader = Arc::clone(&pending);
        std::thread::Builder::new()
            .name("meterpay-cdp-reader".into())
            .spawn(move || read_loop(reader, pending_reader))?;

        Ok(Self {
            child: Mutex::new(child),
            writer: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    /// Send a command, optionally scoped to an attached target session
    pub async fn call<C: Command>(
        &self,
        session_id: Option<&str>,
        command: &C,
    ) -> Result<C::Response> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut message = json!({
            "id": id,
            "method": C::METHOD,
            "params": serde_json::to_value(command)?,
        });
        if let Some(session_id) = session_id {
            message["sessionId"] = Value::String(session_id.to_string());
        }
        let data = serde_json::to_vec(&message)?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.register(id, tx)?;

        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_all(&ws::encode(ws::OPCODE_TEXT, &data, rand::random()))
        };
        if let Err(e) = written {
            self.pending.lock().await.forget(id);
            return Err(Error::transport_io("WebSocket write failed", e));
        }
        tracing::trace!("-> {} (id={})", C::METHOD, id);

        let reply = await_reply(rx, C::METHOD, CALL_TIMEOUT).await;
        if reply.is_err() {
            self.pending.lock().await.forget(id);
        }
        let value = reply.map_err(|e| match e {
            Error::Cdp { code, message, .. } => Error::cdp(C::METHOD, code, message),
            other => other,
        })?;
        Ok(serde_json::from_value(value)?)
    }

    /// Close the socket and terminate the browser process
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.write_all(&ws::encode(ws::OPCODE_CLOSE, &[], rand::random()));
        }
        let mut child = self.child.lock().await;
        let _ = child.kill();
        let _ = child.wait();
        Ok(())
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(mut child) = self.child.try_lock() {
            let _ = child.kill();
        }
    }
}

/// Route responses to their waiters until the socket closes
fn read_loop(mut stream: TcpStream, pending: Pending) {
    loop {
        let frame = match ws::read(&mut stream) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("DevTools socket read ended: {}", e);
                break;
            }
        };

        match frame.opcode {
            ws::OPCODE_TEXT => {
                let msg: Value = match serde_json::from_slice(&frame.payload) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("Unparseable CDP message: {}", e);
                        continue;
                    }
                };
                let Some(id) = msg.get("id").and_then(Value::as_u64) else {
                    // Events are not consumed by the portal driver
                    continue;
                };
                let result = match msg.get("error") {
                    Some(err) => Err(Error::cdp(
                        "unknown",
                        err.get("code").and_then(Value::as_i64).unwrap_or(-1),
                        err.get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown"),
                    )),
                    None => Ok(msg.get("result").cloned().unwrap_or_else(|| json!({}))),
                };
                pending.blocking_lock().resolve(id, result);
            }
            ws::OPCODE_PING => {
                let _ = stream.write_all(&ws::encode(ws::OPCODE_PONG, &frame.payload, [0; 4]));
            }
            ws::OPCODE_CLOSE => break,
            _ => {}
        }
    }

    pending.blocking_lock().close();
}

/// Spawn a browser binary and read the DevTools WebSocket URL it prints
pub fn launch_process(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut child = ProcessCommand::new(path)
        .args(args)
        .arg("--remote-debugging-port=0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Launch(format!("{}: {}", path.display(), e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Launch("browser stderr unavailable".into()))?;

    // The browser prints: DevTools listening on ws://127.0.0.1:PORT/devtools/browser/GUID
    let ws_url = BufReader::new(stderr)
        .lines()
        .map_while(|line| line.ok())
        .inspect(|line| tracing::trace!("browser stderr: {}", line))
        .find_map(|line| line.find("ws://").map(|at| line[at..].trim().to_string()));

    match ws_url {
        Some(url) => {
            tracing::debug!("DevTools endpoint: {}", url);
            Ok((child, url))
        }
        None => {
            let _ = child.kill();
            Err(Error::Launch(format!(
                "{} exited without printing a DevTools endpoint",
                path.display()
            )))
        }
    }
}
