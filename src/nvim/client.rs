//! Minimal Neovim client for msgpack-RPC communication.
//!
//! Provides the transport-level primitives (requests, notifications and the
//! notification stream). Editor operations live in [`super::NvimApi`].

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use rmpv::Value;

use super::{Notification, Rpc, RpcError};
use crate::address::Endpoint;

const REQUEST: u64 = 0;
const RESPONSE: u64 = 1;
const NOTIFICATION: u64 = 2;

/// Byte stream to a listening editor.
pub enum Transport {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Transport {
    /// Open a stream to the endpoint.
    pub fn open(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            #[cfg(unix)]
            Endpoint::Socket(path) => UnixStream::connect(path).map(Self::Unix),
            #[cfg(not(unix))]
            Endpoint::Socket(path) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unix sockets are not supported here: {}", path.display()),
            )),
            Endpoint::Tcp { host, port } => {
                TcpStream::connect((host.as_str(), *port)).map(Self::Tcp)
            }
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
            Self::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
            Self::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
            Self::Tcp(stream) => stream.flush(),
        }
    }
}

/// Neovim client for RPC communication.
///
/// Calls are strictly sequential: a request is written and the stream is read
/// until the matching response arrives. Notifications seen in between are
/// queued and handed out by [`Rpc::next_notification`] in arrival order.
pub struct NvimClient<S = Transport> {
    stream: S,
    msgid: u32,
    pending: VecDeque<Notification>,
    channel_id: Option<i64>,
}

impl NvimClient {
    /// Connect to the editor listening on `endpoint`.
    pub fn connect(endpoint: &Endpoint) -> Result<Self, RpcError> {
        let stream = Transport::open(endpoint)?;
        tracing::debug!(%endpoint, "Connected to nvim");
        Ok(Self::from_stream(stream))
    }

    /// Connect, treating failure as "no editor there".
    ///
    /// An unreachable endpoint is the common case when no server runs yet,
    /// so this only logs at debug level.
    pub fn try_connect(endpoint: &Endpoint) -> Option<Self> {
        match Self::connect(endpoint) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::debug!(%endpoint, error = %e, "Failed to attach");
                None
            }
        }
    }
}

impl<S: Read + Write> NvimClient<S> {
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            msgid: 0,
            pending: VecDeque::new(),
            channel_id: None,
        }
    }

    fn send(&mut self, message: &Value) -> Result<(), RpcError> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, message)
            .map_err(|e| RpcError::Encode(e.to_string()))?;
        self.stream.write_all(&buf)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<Value>, RpcError> {
        let message = rmpv::decode::read_value(&mut self.stream).map_err(|e| match e {
            rmpv::decode::Error::InvalidMarkerRead(io)
            | rmpv::decode::Error::InvalidDataRead(io)
                if io.kind() == io::ErrorKind::UnexpectedEof =>
            {
                RpcError::Closed
            }
            other => RpcError::Decode(other.to_string()),
        })?;

        match message {
            Value::Array(parts) => Ok(parts),
            other => Err(RpcError::InvalidMessage(format!("{other}"))),
        }
    }

    /// Read one message and route it. Returns a response as `(msgid, error, result)`.
    fn dispatch(&mut self) -> Result<Option<(u64, Value, Value)>, RpcError> {
        let mut parts = self.receive()?.into_iter();
        let kind = parts.next().and_then(|v| v.as_u64());

        match kind {
            Some(RESPONSE) => {
                let msgid = parts.next().and_then(|v| v.as_u64()).unwrap_or(u64::MAX);
                let error = parts.next().unwrap_or(Value::Nil);
                let result = parts.next().unwrap_or(Value::Nil);
                Ok(Some((msgid, error, result)))
            }
            Some(NOTIFICATION) => {
                let method = parts
                    .next()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let args = match parts.next() {
                    Some(Value::Array(args)) => args,
                    _ => Vec::new(),
                };
                tracing::debug!(method = %method, "Received notification");
                self.pending.push_back(Notification { method, args });
                Ok(None)
            }
            Some(REQUEST) => {
                // We expose no methods; answer so the editor is not left blocking.
                let msgid = parts.next().unwrap_or(Value::Nil);
                let method = parts.next().unwrap_or(Value::Nil);
                tracing::debug!(method = %method, "Rejecting request from nvim");
                self.send(&Value::Array(vec![
                    Value::from(RESPONSE),
                    msgid,
                    Value::from(format!("nvr does not handle {method}")),
                    Value::Nil,
                ]))?;
                Ok(None)
            }
            _ => Err(RpcError::InvalidMessage("unknown message type".to_string())),
        }
    }
}

impl<S: Read + Write> Rpc for NvimClient<S> {
    fn call(&mut self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let msgid = self.msgid;
        self.msgid = self.msgid.wrapping_add(1);

        tracing::debug!(msgid, method, "RPC request");
        self.send(&Value::Array(vec![
            Value::from(REQUEST),
            Value::from(msgid),
            Value::from(method),
            Value::Array(args),
        ]))?;

        loop {
            let Some((id, error, result)) = self.dispatch()? else {
                continue;
            };
            if id != u64::from(msgid) {
                tracing::warn!(expected = msgid, got = id, "Dropping unexpected response");
                continue;
            }
            if !error.is_nil() {
                return Err(RpcError::from_remote(error));
            }
            return Ok(result);
        }
    }

    fn notify(&mut self, method: &str, args: Vec<Value>) -> Result<(), RpcError> {
        tracing::debug!(method, "RPC notification");
        self.send(&Value::Array(vec![
            Value::from(NOTIFICATION),
            Value::from(method),
            Value::Array(args),
        ]))
    }

    fn next_notification(&mut self) -> Result<Notification, RpcError> {
        loop {
            if let Some(notification) = self.pending.pop_front() {
                return Ok(notification);
            }
            if let Some((id, _, _)) = self.dispatch()? {
                tracing::warn!(msgid = id, "Dropping response with no pending request");
            }
        }
    }

    fn channel_id(&mut self) -> Result<i64, RpcError> {
        if let Some(id) = self.channel_id {
            return Ok(id);
        }
        let info = self.call("nvim_get_api_info", vec![])?;
        let id = info
            .as_array()
            .and_then(|parts| parts.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| RpcError::InvalidMessage("nvim_get_api_info".to_string()))?;
        self.channel_id = Some(id);
        Ok(id)
    }
}
