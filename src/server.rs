//! Minimal blocking HTTP front end for a [`TraceScope`].
//!
//! Requests are served one at a time, each on its own connection. Only the
//! request line is looked at; headers and bodies are read and dropped.
//! Slow or oversized requests are cut off so one client can't stall the
//! queue behind it.

use crate::error::Error;
use crate::scope::TraceScope;
use serde::Serialize;
use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::str::FromStr;
use std::time::Duration;

const MAX_LINE: u64 = 8 * 1024;
const MAX_HEADERS: usize = 100;

/// Where to listen.
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// How long a client may take to send each part of its request.
    pub read_timeout: Duration,
}

struct Route {
    path: &'static str,
    label: &'static str,
    handler: fn(&TraceScope, &Query) -> Response,
}

const ROUTES: &[Route] = &[
    Route {
        path: "/heatmap",
        label: "Heatmap",
        handler: heatmap,
    },
    Route {
        path: "/range",
        label: "Range",
        handler: range,
    },
];

fn heatmap(scope: &TraceScope, query: &Query) -> Response {
    match query.parse::<usize>("rows") {
        Ok(rows) => Response::from_result(scope.heatmap(rows)),
        Err(response) => response,
    }
}

fn range(scope: &TraceScope, query: &Query) -> Response {
    let bounds = query
        .parse::<f64>("start")
        .and_then(|start| Ok((start, query.parse::<f64>("end")?)));
    match bounds {
        Ok((start, end)) => Response::from_result(scope.range_flame(start, end)),
        Err(response) => response,
    }
}

/// Decoded `key=value` pairs of a query string. Pairs with an empty value
/// are dropped, and the first remaining occurrence of a key wins.
struct Query<'a> {
    pairs: Vec<(Cow<'a, str>, Cow<'a, str>)>,
}

impl<'a> Query<'a> {
    fn new(query: &'a str) -> Query<'a> {
        let pairs = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (decode(key), decode(value)))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        Query { pairs }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_ref())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, Response> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                log::debug!("bad query value: {key}={value}");
                Response::empty(400)
            }),
        }
    }
}

/// Undoes `application/x-www-form-urlencoded` escaping. Malformed `%`
/// escapes are kept as they are.
fn decode(text: &str) -> Cow<'_, str> {
    if !text.contains(&['%', '+'][..]) {
        return Cow::Borrowed(text);
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let escaped = text
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match escaped {
                    Some(byte) => {
                        out.push(byte);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

#[derive(Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Option<String>,
}

impl Response {
    fn empty(status: u16) -> Response {
        Response { status, body: None }
    }

    fn from_result<T: Serialize>(result: crate::error::Result<T>) -> Response {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                log::debug!("{e}");
                return Response::empty(status_of(&e));
            }
        };
        match serde_json::to_string(&value) {
            Ok(body) => Response {
                status: 200,
                body: Some(body),
            },
            Err(e) => {
                log::warn!("can't encode response: {e}");
                Response::empty(500)
            }
        }
    }

    pub fn write_to<W: Write>(&self, mut out: W) -> io::Result<()> {
        let body = self.body.as_deref().unwrap_or("");
        write!(
            out,
            "HTTP/1.0 {} {}\r\n\
             Content-Type: application/json\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            self.status,
            reason(self.status),
            body.len(),
            body
        )?;
        out.flush()
    }
}

fn status_of(error: &Error) -> u16 {
    match error {
        Error::UnsatisfiableRange { .. } => 416,
        Error::InvalidRows => 400,
        Error::NoSamples => 404,
        Error::Io { .. } => 500,
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        416 => "Range Not Satisfiable",
        _ => "Internal Server Error",
    }
}

/// Dispatches one request line's method and target.
pub fn route(scope: &TraceScope, method: &str, target: &str) -> Response {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    match method {
        "HEAD" => return Response::empty(200),
        "GET" => {}
        _ => return Response::empty(405),
    }
    match ROUTES.iter().find(|route| route.path == path) {
        Some(route) => {
            log::debug!("{} request: {}", route.label, target);
            (route.handler)(scope, &Query::new(query))
        }
        None => {
            log::debug!("Invalid request: {}", target);
            Response::empty(404)
        }
    }
}

pub fn bind(config: &ServerConfig) -> io::Result<TcpListener> {
    TcpListener::bind((config.bind.as_str(), config.port))
}

/// Serves requests until the listener fails.
pub fn serve(
    scope: &TraceScope,
    listener: TcpListener,
    read_timeout: Duration,
) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = handle_connection(scope, stream, read_timeout) {
                    log::warn!("connection error: {e}");
                }
            }
            Err(e) => log::warn!("accept failed: {e}"),
        }
    }
    Ok(())
}

/// Reads one line of at most `MAX_LINE` bytes. `None` when the line is
/// longer than that or the input ends before a newline.
fn read_line_bounded<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    reader.by_ref().take(MAX_LINE).read_line(&mut line)?;
    Ok(line.ends_with('\n').then_some(line))
}

fn handle_connection(
    scope: &TraceScope,
    stream: TcpStream,
    read_timeout: Duration,
) -> io::Result<()> {
    stream.set_read_timeout(Some(read_timeout))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let Some(request_line) = read_line_bounded(&mut reader)? else {
        return Response::empty(400).write_to(&stream);
    };

    // drain headers
    for _ in 0..MAX_HEADERS {
        match read_line_bounded(&mut reader)? {
            Some(header) if !header.trim().is_empty() => {}
            _ => break,
        }
    }

    let mut parts = request_line.split_whitespace();
    let response = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => route(scope, method, target),
        _ => Response::empty(400),
    };
    response.write_to(&stream)
}
