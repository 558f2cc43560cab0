//! SIP message parsing and serialization
//!
//! The trunk speaks the registrar/inbound-call subset of SIP over UDP, so
//! this is a deliberately small reader/writer for that subset: start line,
//! unfolded headers, binary body. Header lookup is case-insensitive; short
//! forms are normalized to their long names on parse.

use crate::error::{Result, TrunkError};

/// Magic cookie every RFC 3261 Via branch starts with
pub const BRANCH_COOKIE: &str = "z9hG4bK";

/// Ordered SIP header list with case-insensitive lookup
#[derive(Debug, Clone, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Empty header list
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// First value of `name`, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a header
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Replace the first occurrence of `name`, or append
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        if let Some(slot) = self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            slot.1 = value.into();
        } else {
            self.push(name.to_string(), value);
        }
    }

    /// All values of `name` in order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn write(&self, out: &mut String) {
        for (name, value) in &self.0 {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
    }
}

/// A parsed SIP request
#[derive(Debug, Clone)]
pub struct SipRequest {
    /// Request method (INVITE, ACK, BYE, ...)
    pub method: String,
    /// Request URI
    pub uri: String,
    /// Header list
    pub headers: Headers,
    /// Message body (SDP for INVITE)
    pub body: Vec<u8>,
}

/// A parsed SIP response
#[derive(Debug, Clone)]
pub struct SipResponse {
    /// Status code
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Header list
    pub headers: Headers,
    /// Message body
    pub body: Vec<u8>,
}

/// Either side of a SIP exchange
#[derive(Debug, Clone)]
pub enum SipMessage {
    /// Request from the peer
    Request(SipRequest),
    /// Response to one of our requests
    Response(SipResponse),
}

impl SipRequest {
    /// New request with an empty header list
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Serialize for the wire, appending Content-Length
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("{} {} SIP/2.0\r\n", self.method, self.uri);
        self.headers.write(&mut head);
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    /// CSeq sequence number, if parseable
    pub fn cseq(&self) -> Option<(u32, String)> {
        parse_cseq(self.headers.get("CSeq")?)
    }
}

impl SipResponse {
    /// Serialize for the wire, appending Content-Length
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("SIP/2.0 {} {}\r\n", self.status, self.reason);
        self.headers.write(&mut head);
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.body.len()));
        let mut out = head.into_bytes();
        out.extend_from_slice(&self.body);
        out
    }

    /// CSeq sequence number and method, if parseable
    pub fn cseq(&self) -> Option<(u32, String)> {
        parse_cseq(self.headers.get("CSeq")?)
    }
}

fn parse_cseq(value: &str) -> Option<(u32, String)> {
    let mut parts = value.split_whitespace();
    let seq = parts.next()?.parse().ok()?;
    let method = parts.next()?.to_string();
    Some((seq, method))
}

/// Reason phrase for the status codes the trunk sends
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Trying",
        180 => "Ringing",
        200 => "OK",
        403 => "Forbidden",
        481 => "Call/Transaction Does Not Exist",
        486 => "Busy Here",
        487 => "Request Terminated",
        488 => "Not Acceptable Here",
        _ => "Unknown",
    }
}

fn normalize_header_name(name: &str) -> &str {
    // Compact forms the trunk may receive from carriers.
    match name {
        "v" | "V" => "Via",
        "f" | "F" => "From",
        "t" | "T" => "To",
        "i" | "I" => "Call-ID",
        "m" | "M" => "Contact",
        "l" | "L" => "Content-Length",
        "c" | "C" => "Content-Type",
        other => other,
    }
}

/// Parse one UDP datagram into a SIP message
pub fn parse(buf: &[u8]) -> Result<SipMessage> {
    let split = find_header_end(buf).ok_or_else(|| TrunkError::Protocol {
        reason: "missing header terminator".into(),
    })?;
    let head = std::str::from_utf8(&buf[..split]).map_err(|_| TrunkError::Protocol {
        reason: "non-utf8 header section".into(),
    })?;
    let body = buf[split + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let start = lines.next().ok_or_else(|| TrunkError::Protocol {
        reason: "empty message".into(),
    })?;

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| TrunkError::Protocol {
            reason: format!("malformed header line: {line}"),
        })?;
        headers.push(normalize_header_name(name.trim()).to_string(), value.trim());
    }

    if let Some(rest) = start.strip_prefix("SIP/2.0 ") {
        let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
        let status = code.parse().map_err(|_| TrunkError::Protocol {
            reason: format!("bad status line: {start}"),
        })?;
        Ok(SipMessage::Response(SipResponse {
            status,
            reason: reason.to_string(),
            headers,
            body,
        }))
    } else {
        let mut parts = start.split(' ');
        let method = parts.next().unwrap_or("").to_string();
        let uri = parts.next().unwrap_or("").to_string();
        let version = parts.next();
        if method.is_empty() || uri.is_empty() || version != Some("SIP/2.0") {
            return Err(TrunkError::Protocol {
                reason: format!("bad request line: {start}"),
            });
        }
        Ok(SipMessage::Request(SipRequest {
            method,
            uri,
            headers,
            body,
        }))
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Extract the tag parameter from a From/To header value
pub fn header_tag(value: &str) -> Option<&str> {
    value.split(';').find_map(|p| p.trim().strip_prefix("tag="))
}

/// Extract the URI between angle brackets, or the bare URI
pub fn header_uri(value: &str) -> &str {
    match (value.find('<'), value.find('>')) {
        (Some(open), Some(close)) if close > open => &value[open + 1..close],
        _ => value.split(';').next().unwrap_or(value).trim(),
    }
}

/// Extract the caller number from a From header.
///
/// Takes the digits of the quoted display name when present, otherwise the
/// digits of the user part of the `sip:` URI:
/// `"015901969502" <sip:015901969502@example.de>` -> `015901969502`.
pub fn caller_id_from_header(from: &str) -> String {
    if let Some(open) = from.find('"') {
        if let Some(len) = from[open + 1..].find('"') {
            let display = &from[open + 1..open + 1 + len];
            let digits = keep_number_chars(display);
            if !digits.is_empty() {
                return digits;
            }
        }
    }
    let uri = header_uri(from);
    let user = uri
        .strip_prefix("sip:")
        .or_else(|| uri.strip_prefix("sips:"))
        .unwrap_or(uri);
    let user = user.split('@').next().unwrap_or(user);
    let digits = keep_number_chars(user);
    if digits.is_empty() {
        user.to_string()
    } else {
        digits
    }
}

fn keep_number_chars(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Random Via branch with the RFC 3261 cookie
pub fn new_branch() -> String {
    format!("{}{:016x}", BRANCH_COOKIE, rand::random::<u64>())
}

/// Random dialog tag
pub fn new_tag() -> String {
    format!("{:08x}", rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_RESPONSE: &[u8] = b"SIP/2.0 200 OK\r\n\
        Via: SIP/2.0/UDP 10.0.0.2:5060;branch=z9hG4bKabc\r\n\
        From: <sip:100@example.de>;tag=aa\r\n\
        To: <sip:100@example.de>;tag=bb\r\n\
        Call-ID: xyz@10.0.0.2\r\n\
        CSeq: 2 REGISTER\r\n\
        Content-Length: 0\r\n\r\n";

    #[test]
    fn parses_response() {
        let msg = parse(OK_RESPONSE).unwrap();
        let resp = match msg {
            SipMessage::Response(r) => r,
            _ => panic!("expected response"),
        };
        assert_eq!(resp.status, 200);
        assert_eq!(resp.cseq(), Some((2, "REGISTER".to_string())));
        assert_eq!(header_tag(resp.headers.get("To").unwrap()), Some("bb"));
    }

    #[test]
    fn parses_request_with_body() {
        let raw = b"INVITE sip:100@example.de SIP/2.0\r\n\
            Via: SIP/2.0/UDP 1.2.3.4;branch=z9hG4bKxyz\r\n\
            From: \"015901969502\" <sip:015901969502@example.de>;tag=cc\r\n\
            To: <sip:100@example.de>\r\n\
            Call-ID: call1\r\n\
            CSeq: 1 INVITE\r\n\
            Content-Type: application/sdp\r\n\
            Content-Length: 4\r\n\r\nv=0\r\n";
        let msg = parse(raw).unwrap();
        let req = match msg {
            SipMessage::Request(r) => r,
            _ => panic!("expected request"),
        };
        assert_eq!(req.method, "INVITE");
        assert_eq!(req.body, b"v=0\r\n");
        assert_eq!(
            caller_id_from_header(req.headers.get("From").unwrap()),
            "015901969502"
        );
    }

    #[test]
    fn caller_id_falls_back_to_uri_user() {
        assert_eq!(
            caller_id_from_header("<sip:+4915901969502@carrier.example>"),
            "+4915901969502"
        );
        assert_eq!(caller_id_from_header("sip:anonymous@invalid"), "anonymous");
    }

    #[test]
    fn compact_header_names_are_normalized() {
        let raw = b"SIP/2.0 200 OK\r\nf: <sip:a@b>;tag=x\r\ni: zz\r\nCSeq: 1 REGISTER\r\n\r\n";
        let msg = parse(raw).unwrap();
        let resp = match msg {
            SipMessage::Response(r) => r,
            _ => panic!(),
        };
        assert!(resp.headers.get("From").is_some());
        assert_eq!(resp.headers.get("Call-ID"), Some("zz"));
    }

    #[test]
    fn serialization_appends_content_length() {
        let mut req = SipRequest::new("REGISTER", "sip:example.de");
        req.headers.push("Call-ID", "abc");
        let wire = String::from_utf8(req.to_bytes()).unwrap();
        assert!(wire.starts_with("REGISTER sip:example.de SIP/2.0\r\n"));
        assert!(wire.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn branch_carries_cookie() {
        assert!(new_branch().starts_with(BRANCH_COOKIE));
        assert_ne!(new_branch(), new_branch());
    }
}
