//! A scripted FogBugz server on a local socket.
//!
//! Every connection carries one request and is closed after the reply, so
//! the request log holds exactly what reached the wire.

use bz2fb::target::{RetryPolicy, TargetSettings};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Session token handed out by [`installation`].
pub const TOKEN: &str = "tok-5f2a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl Request {
    pub fn cmd(&self) -> Option<&str> {
        lookup(&self.query, "cmd")
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        lookup(&self.query, key)
    }

    pub fn form_param(&self, key: &str) -> Option<&str> {
        lookup(&self.form, key)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

#[derive(Debug, Clone)]
pub enum Reply {
    Xml(String),
    Status(u16),
    /// Read the whole request, then close without answering.
    Hangup,
}

pub struct FakeFogBugz {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeFogBugz {
    pub fn start(respond: impl Fn(&Request) -> Reply + Send + 'static) -> Self {
        super::init_test_logging();
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake FogBugz");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                serve(stream, &respond, &log);
            }
        });

        Self { addr, requests }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api.xml", self.addr)
    }

    pub fn settings(&self) -> TargetSettings {
        TargetSettings {
            url: self.api_url(),
            user: "migrator@example.com".into(),
            password: "s3cret pass".into(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("request log").clone()
    }

    /// Number of requests that carried `cmd`.
    pub fn count(&self, cmd: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.cmd() == Some(cmd))
            .count()
    }

    pub fn last(&self, cmd: &str) -> Request {
        self.requests()
            .into_iter()
            .rev()
            .find(|request| request.cmd() == Some(cmd))
            .unwrap_or_else(|| panic!("no {cmd} request was sent"))
    }
}

/// A small installation: discovery, logon, reference lists, an empty search
/// result, case 100 for `new`, and a bare success for every other command.
pub fn installation(request: &Request) -> Reply {
    if request.path == "/api.xml" {
        return Reply::Xml(
            "<response><version>8</version><minversion>1</minversion><url>api.asp?</url></response>"
                .into(),
        );
    }

    let payload = match request.cmd() {
        Some("logon") => format!("<token><![CDATA[{TOKEN}]]></token>"),
        Some("listProjects") => {
            "<projects><project><ixProject>5</ixProject><sProject>Replay</sProject></project></projects>"
                .into()
        }
        Some("listAreas") => {
            "<areas><area><ixArea>50</ixArea><ixProject>5</ixProject><sArea>Server</sArea></area></areas>"
                .into()
        }
        Some("listFixFors") => "<fixfors>\
            <fixfor><ixFixFor>1</ixFixFor><sFixFor>Undecided</sFixFor><ixProject>-1</ixProject></fixfor>\
            <fixfor><ixFixFor>7</ixFixFor><sFixFor>2.0</sFixFor><ixProject>5</ixProject></fixfor>\
            </fixfors>"
            .into(),
        Some("listPriorities") => {
            "<priorities><priority><ixPriority>1</ixPriority><sPriority>Must Fix</sPriority></priority></priorities>"
                .into()
        }
        Some("listPeople") => "<people>\
            <person><ixPerson>2</ixPerson><sEmail>migrator@example.com</sEmail></person>\
            <person><ixPerson>11</ixPerson><sEmail>dev@example.com</sEmail></person>\
            <person><ixPerson>12</ixPerson><sEmail></sEmail></person>\
            </people>"
            .into(),
        Some("listStatuses") => "<statuses>\
            <status><ixStatus>1</ixStatus><sStatus>Active</sStatus><fResolved>false</fResolved></status>\
            <status><ixStatus>2</ixStatus><sStatus>Resolved (Fixed)</sStatus><fResolved>true</fResolved></status>\
            </statuses>"
            .into(),
        Some("search") => r#"<cases count="0"></cases>"#.into(),
        Some("new") => r#"<case ixBug="100" operations="edit,assign,resolve"></case>"#.into(),
        Some(_) => String::new(),
        None => return Reply::Status(404),
    };
    Reply::Xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><response>{payload}</response>"#
    ))
}

/// An `<error>` envelope as FogBugz sends it.
pub fn error_reply(code: i64, message: &str) -> Reply {
    Reply::Xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><response><error code="{code}"><![CDATA[{message}]]></error></response>"#
    ))
}

fn serve(mut stream: TcpStream, respond: &impl Fn(&Request) -> Reply, log: &Mutex<Vec<Request>>) {
    let Some(request) = read_request(&stream) else {
        return;
    };
    let reply = respond(&request);
    log.lock().expect("request log").push(request);

    let response = match reply {
        Reply::Xml(body) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ),
        Reply::Status(code) => format!(
            "HTTP/1.1 {code} Scripted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ),
        Reply::Hangup => return,
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).ok()? == 0 {
            return None;
        }
        let header = header.trim();
        if header.is_empty() {
            break;
        }
        if let Some((key, value)) = header.split_once(':')
            && key.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().ok()?;
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(Request {
        method,
        path: path.to_string(),
        query: decode_pairs(query),
        form: decode_pairs(&String::from_utf8_lossy(&body)),
    })
}

fn decode_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                if let Some(byte) = raw
                    .get(i + 1..i + 3)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
