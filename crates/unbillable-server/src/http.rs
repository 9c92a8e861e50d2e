use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use serde_json::Value;

/// Upper bound on bytes discarded from an oversized body before answering 413.
const DRAIN_LIMIT: u64 = 4 * 1024 * 1024;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Declared body length exceeded the configured limit; `body` is empty.
    pub oversized: bool,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::to_vec(&value).unwrap_or_else(|_| b"{}".to_vec()),
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }
}

pub fn read_http_request(stream: &TcpStream, max_body: usize) -> io::Result<Option<HttpRequest>> {
    let mut reader = io::BufReader::new(stream.try_clone()?);
    parse_request(&mut reader, max_body)
}

/// Reads one request. Bodies over `max_body` are drained (up to
/// [`DRAIN_LIMIT`]) and dropped so the client still sees the 413.
pub fn parse_request<R: BufRead>(reader: &mut R, max_body: usize) -> io::Result<Option<HttpRequest>> {
    let Some(request_line) = read_trimmed_line(reader)? else {
        return Ok(None);
    };
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    let (method, target) = match parts.as_slice() {
        [method, target, ..] => (method.to_ascii_uppercase(), target.to_string()),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed request line: {request_line:?}"),
            ))
        }
    };

    let content_length = read_content_length(reader)?;
    let oversized = content_length > max_body;
    let body = if oversized {
        let declared = u64::try_from(content_length).unwrap_or(u64::MAX);
        io::copy(&mut reader.by_ref().take(declared.min(DRAIN_LIMIT)), &mut io::sink())?;
        Vec::new()
    } else {
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body)?;
        body
    };

    let (path, query) = parse_path_query(&target);
    Ok(Some(HttpRequest {
        method,
        path,
        query,
        body,
        oversized,
    }))
}

fn read_trimmed_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\r', '\n']);
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Consumes the header block; only `Content-Length` matters to the router.
fn read_content_length<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut content_length = 0;
    while let Some(header) = read_trimmed_line(reader)? {
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    Ok(content_length)
}

pub fn write_http_response<W: Write>(out: &mut W, response: &HttpResponse) -> io::Result<()> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
        response.status,
        http_reason_phrase(response.status),
        response.content_type,
        response.body.len()
    );
    for (name, value) in CORS_HEADERS {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("Connection: close\r\n\r\n");
    out.write_all(head.as_bytes())?;
    out.write_all(&response.body)?;
    out.flush()
}

pub fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

pub fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = match raw.split_once('?') {
        Some((p, q)) => (p.to_string(), q),
        None => (raw.to_string(), ""),
    };
    let mut query = HashMap::new();
    for pair in query_str.split('&') {
        if pair.is_empty() {
            continue;
        }
        if let Some((k, v)) = pair.split_once('=') {
            query.insert(k.to_string(), v.to_string());
        } else {
            query.insert(pair.to_string(), String::new());
        }
    }
    (path, query)
}
