//! IPC protocol messages for the Python runtime worker.
//!
//! Uses length-prefixed JSON messages over stdin/stdout.
//! Format: 4-byte length (u32 LE) + UTF-8 JSON body.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Largest message accepted from either side (100MB).
pub const MAX_MESSAGE_LEN: usize = 100 * 1024 * 1024;

/// Request sent from the kernel to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuntimeRequest {
    /// Execute Python source in the persistent namespace.
    Execute {
        /// Source text.
        code: String,
        /// Name shown in tracebacks.
        filename: String,
    },

    /// Replace the namespace with a fresh one.
    Reset,

    /// Bind a variable.
    SetVariable { name: String, value: Value },

    /// Read a variable.
    GetVariable { name: String },

    /// Check the worker is alive.
    Ping,

    /// Exit the worker.
    Shutdown,
}

/// Response sent from the worker to the kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeResponse {
    /// Execution completed.
    Executed {
        stdout: String,
        stderr: String,
        /// `repr` of the trailing expression, if not `None`.
        value: Option<String>,
    },

    /// User code raised.
    Fault {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
        stdout: String,
        stderr: String,
    },

    /// Value of a requested variable (`null` when unbound).
    Variable { value: Option<Value> },

    /// Request without a payload completed.
    Done,

    /// Response to `Ping`.
    Pong,

    /// Acknowledgement of `Shutdown`.
    ShuttingDown,

    /// The worker could not handle the request.
    Error { message: String },
}

/// Write a message to a writer using length-prefixed JSON encoding.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<()> {
    let bytes = serde_json::to_vec(message)
        .map_err(|e| Error::Serialization(format!("Failed to encode IPC message: {}", e)))?;

    if bytes.len() > MAX_MESSAGE_LEN {
        return Err(Error::Ipc(format!(
            "IPC message too large: {} bytes",
            bytes.len()
        )));
    }

    let len = bytes.len() as u32;
    writer
        .write_all(&len.to_le_bytes())
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message length: {}", e)))?;
    writer
        .write_all(&bytes)
        .map_err(|e| Error::Ipc(format!("Failed to write IPC message body: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Ipc(format!("Failed to flush IPC stream: {}", e)))?;

    Ok(())
}

/// Read a message from a reader using length-prefixed JSON encoding.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    reader
        .read_exact(&mut len_bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message length: {}", e)))?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_LEN {
        return Err(Error::Ipc(format!("IPC message too large: {} bytes", len)));
    }

    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| Error::Ipc(format!("Failed to read IPC message body: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Serialization(format!("Failed to decode IPC message: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_execute_request_wire_shape() {
        let request = RuntimeRequest::Execute {
            code: "print(1)".to_string(),
            filename: "fable.py".to_string(),
        };

        let mut buf = Vec::new();
        write_message(&mut buf, &request).unwrap();

        let len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        assert_eq!(len, buf.len() - 4);

        let body: Value = serde_json::from_slice(&buf[4..]).unwrap();
        assert_eq!(body["op"], "execute");
        assert_eq!(body["code"], "print(1)");
        assert_eq!(body["filename"], "fable.py");
    }

    #[test]
    fn test_unit_requests_are_tag_only() {
        let mut buf = Vec::new();
        write_message(&mut buf, &RuntimeRequest::Reset).unwrap();
        assert_eq!(&buf[4..], br#"{"op":"reset"}"#);
    }

    #[test]
    fn test_reads_worker_fault() {
        let body = br#"{"kind":"fault","ename":"ZeroDivisionError","evalue":"division by zero","traceback":["Traceback"],"stdout":"","stderr":""}"#;
        let mut buf = (body.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(body);

        let decoded: RuntimeResponse = read_message(&mut Cursor::new(buf)).unwrap();
        match decoded {
            RuntimeResponse::Fault { ename, evalue, .. } => {
                assert_eq!(ename, "ZeroDivisionError");
                assert_eq!(evalue, "division by zero");
            }
            other => panic!("Wrong response type: {:?}", other),
        }
    }

    #[test]
    fn test_null_value_reads_as_none() {
        let body = br#"{"kind":"executed","stdout":"2\n","stderr":"","value":null}"#;
        let mut buf = (body.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(body);

        let decoded: RuntimeResponse = read_message(&mut Cursor::new(buf)).unwrap();
        assert_eq!(
            decoded,
            RuntimeResponse::Executed {
                stdout: "2\n".to_string(),
                stderr: String::new(),
                value: None,
            }
        );
    }

    #[test]
    fn test_rejects_oversized_length() {
        let buf = ((MAX_MESSAGE_LEN as u32) + 1).to_le_bytes().to_vec();
        let result: Result<RuntimeResponse> = read_message(&mut Cursor::new(buf));
        assert!(matches!(result, Err(Error::Ipc(_))));
    }

    #[test]
    fn test_truncated_body_is_ipc_error() {
        let mut buf = 10u32.to_le_bytes().to_vec();
        buf.extend_from_slice(b"{\"ki");
        let result: Result<RuntimeResponse> = read_message(&mut Cursor::new(buf));
        assert!(matches!(result, Err(Error::Ipc(_))));
    }
}
