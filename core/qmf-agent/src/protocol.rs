//! QMF wire protocol constants and the V1 binary framing.
//!
//! The V2 dialect carries JSON map/list bodies under `app_id = "qmf2"`,
//! classified by the `qmf.opcode` application header. The V1 dialect is a
//! binary frame: the magic bytes `A M 2`, one opcode byte, and a big-endian
//! 32-bit sequence, followed by an opcode-specific body of short strings
//! (1-byte length prefix) and fixed 16-byte hashes.

/// Application id marking V2 map-encoded messages.
pub const APP_ID: &str = "qmf2";

/// Content type declared on list-encoded bodies.
pub const CONTENT_TYPE_LIST: &str = "amqp/list";

/// V2 opcodes carried in the `qmf.opcode` application header.
pub mod opcode {
    pub const AGENT_LOCATE_REQUEST: &str = "_agent_locate_request";
    pub const AGENT_LOCATE_RESPONSE: &str = "_agent_locate_response";
    pub const AGENT_HEARTBEAT_INDICATION: &str = "_agent_heartbeat_indication";
    pub const DATA_INDICATION: &str = "_data_indication";
    pub const METHOD_REQUEST: &str = "_method_request";
    pub const METHOD_RESPONSE: &str = "_method_response";
    pub const QUERY_REQUEST: &str = "_query_request";
    pub const QUERY_RESPONSE: &str = "_query_response";
    pub const EXCEPTION: &str = "_exception";
}

/// Application header keys.
pub mod header {
    pub const METHOD: &str = "method";
    pub const OPCODE: &str = "qmf.opcode";
    pub const AGENT: &str = "qmf.agent";
    pub const CONTENT: &str = "qmf.content";
    pub const PARTIAL: &str = "partial";
    pub const APP_ID: &str = "app_id";
}

/// Exchanges the agent publishes to.
pub mod exchange {
    pub const DIRECT: &str = "amq.direct";
    pub const QMF_DIRECT: &str = "qmf.default.direct";
    pub const QMF_TOPIC: &str = "qmf.default.topic";
    pub const MANAGEMENT: &str = "qpid.management";
}

/// Well-known routing keys.
pub mod routing {
    pub const HEARTBEAT: &str = "agent.ind.heartbeat";
    pub const DATA: &str = "agent.ind.data";
    pub const SCHEMA_PACKAGE: &str = "schema.package";
    pub const CONSOLE_WILDCARD: &str = "console.#";
}

/// V1 frame opcodes.
pub mod v1 {
    pub const SCHEMA_REQUEST: u8 = b'S';
    pub const SCHEMA_INDICATION: u8 = b's';
    pub const CONSOLE_ADDED: u8 = b'x';
    pub const PACKAGE_INDICATION: u8 = b'p';
    pub const BANK_ASSIGNMENT: u8 = b'a';
}

/// Length of the V1 frame header.
pub const V1_HEADER_LEN: usize = 8;

const V1_MAGIC: &[u8; 3] = b"AM2";

/// Encodes a V1 frame header: magic, opcode, big-endian sequence.
#[must_use]
pub fn encode_header(opcode: u8, sequence: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(V1_HEADER_LEN);
    buf.extend_from_slice(V1_MAGIC);
    buf.push(opcode);
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf
}

/// Checks and strips a V1 frame header, returning the opcode, the sequence
/// and the remaining body. `None` when the frame is short or the magic does
/// not match.
#[must_use]
pub fn check_header(data: &[u8]) -> Option<(u8, u32, &[u8])> {
    if data.len() < V1_HEADER_LEN || &data[..3] != V1_MAGIC {
        return None;
    }
    let opcode = data[3];
    let sequence = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    Some((opcode, sequence, &data[V1_HEADER_LEN..]))
}

/// Appends a short string (1-byte length prefix, at most 255 bytes).
pub fn put_short_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(255);
    buf.push(len as u8);
    buf.extend_from_slice(&bytes[..len]);
}

/// Cursor over a V1 frame body.
#[derive(Debug)]
pub struct V1Reader<'a> {
    data: &'a [u8],
}

impl<'a> V1Reader<'a> {
    /// Wraps a frame body.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Reads a short string.
    pub fn short_string(&mut self) -> Option<String> {
        let (&len, rest) = self.data.split_first()?;
        let len = len as usize;
        if rest.len() < len {
            return None;
        }
        let (s, rest) = rest.split_at(len);
        self.data = rest;
        Some(String::from_utf8_lossy(s).into_owned())
    }

    /// Reads a fixed 16-byte hash.
    pub fn bin128(&mut self) -> Option<[u8; 16]> {
        if self.data.len() < 16 {
            return None;
        }
        let (head, rest) = self.data.split_at(16);
        self.data = rest;
        let mut out = [0u8; 16];
        out.copy_from_slice(head);
        Some(out)
    }

    /// Reads a big-endian u32.
    pub fn u32(&mut self) -> Option<u32> {
        if self.data.len() < 4 {
            return None;
        }
        let (head, rest) = self.data.split_at(4);
        self.data = rest;
        Some(u32::from_be_bytes([head[0], head[1], head[2], head[3]]))
    }
}
