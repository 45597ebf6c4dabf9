//! Scripted [`Transport`] for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

#[derive(Debug, Clone)]
pub(crate) struct Scripted {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Scripted {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::status(status)
            .with_header("Content-Type", "application/json; charset=utf-8")
            .with_body(value.to_string())
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self::status(status)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(body)
    }

    /// Event stream built from raw lines, each terminated by a blank line.
    pub fn sse<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut body = String::new();
        for line in lines {
            body.push_str(line.as_ref());
            body.push_str("\n\n");
        }
        Self::status(200)
            .with_header("Content-Type", "text/event-stream")
            .with_body(body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        self.body
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
            .unwrap_or("")
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_str(self.body_str()).unwrap_or(serde_json::Value::Null)
    }
}

struct Route {
    method: Method,
    pattern: String,
    responses: VecDeque<Scripted>,
}

type Hook = Box<dyn FnOnce() + Send>;

/// Routes are matched by method and URL substring; the longest matching
/// pattern wins. Queued responses are consumed in order and the last one
/// repeats.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    hooks: Mutex<Vec<(String, Hook)>>,
    calls: Mutex<Vec<RecordedCall>>,
    cookies: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, pattern: &str, response: Scripted) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern == pattern)
        {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                pattern: pattern.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    /// Run `hook` once, while the first request whose URL contains
    /// `pattern` is in flight.
    pub fn before(&self, pattern: &str, hook: impl FnOnce() + Send + 'static) -> &Self {
        self.hooks
            .lock()
            .unwrap()
            .push((pattern.to_string(), Box::new(hook)));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.url.contains(pattern))
            .count()
    }

    /// Calls whose URL ends with `suffix`.
    pub fn calls_ending_with(&self, method: Method, suffix: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.url.ends_with(suffix))
            .cloned()
            .collect()
    }

    pub fn cookies(&self) -> Vec<(String, String, String)> {
        self.cookies.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
        });

        let hook = {
            let mut hooks = self.hooks.lock().unwrap();
            hooks
                .iter()
                .position(|(pattern, _)| request.url.contains(pattern.as_str()))
                .map(|i| hooks.remove(i).1)
        };
        if let Some(hook) = hook {
            hook();
        }

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .filter(|r| r.method == request.method && request.url.contains(&r.pattern))
            .max_by_key(|r| r.pattern.len());
        let Some(route) = route else {
            return Err(TransportError::Network(format!(
                "no scripted response for {} {}",
                request.method, request.url
            )));
        };
        let scripted = if route.responses.len() > 1 {
            route.responses.pop_front()
        } else {
            route.responses.front().cloned()
        };
        let scripted = scripted.ok_or_else(|| TransportError::Network("empty route".into()))?;
        Ok(HttpResponse::from_bytes(
            scripted.status,
            scripted.headers,
            scripted.body,
        ))
    }

    fn set_cookie(&self, url: &str, name: &str, value: &str) -> Result<(), TransportError> {
        self.cookies
            .lock()
            .unwrap()
            .push((url.to_string(), name.to_string(), value.to_string()));
        Ok(())
    }
}
