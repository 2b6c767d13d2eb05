//! Path → handler routing (component C2).
//!
//! Shared by reference across all connections on a listener (`Arc<Router>`);
//! read-mostly after bootstrap. Holds the optional push handler/push path,
//! the optional client-response callback, the optional directory handler,
//! and a date string stamped once per connection (`commit_response` reads it
//! for the `date` header on every response on that connection).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;

use crate::directory::DirectoryHandler;
use crate::error::HandlerError;
use crate::message::{Request, Response};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(Request, Response), HandlerError>> + Send>>;

/// A path or push handler: takes ownership of the request/response pair and
/// returns it populated, asynchronously.
pub type Handler = Arc<dyn Fn(Request, Response) -> HandlerFuture + Send + Sync>;

/// The client-side callback invoked once per inbound DATA chunk.
pub type ClientCallback = Arc<dyn Fn(Bytes) + Send + Sync>;

pub struct Router {
    routes: HashMap<String, (Method, Handler)>,
    push_handler: Option<Handler>,
    push_path: Option<String>,
    client_callback: Option<ClientCallback>,
    directory_handler: Option<Box<dyn DirectoryHandler>>,
    date: String,
}

impl Router {
    pub fn new() -> Self {
        Router {
            routes: HashMap::new(),
            push_handler: None,
            push_path: None,
            client_callback: None,
            directory_handler: None,
            date: http_date_now(),
        }
    }

    /// Registers `handler` for `path`; a second registration for the same
    /// path replaces the first (last-write-wins).
    pub fn add(&mut self, method: Method, path: impl Into<String>, handler: Handler) {
        self.routes.insert(path.into(), (method, handler));
    }

    /// Registers both a main handler for `path` and a push handler, and
    /// records `path` as the push-trigger path.
    pub fn add_on_push(&mut self, path: impl Into<String>, main_handler: Handler, push_handler: Handler) {
        let path = path.into();
        self.push_path = Some(path.clone());
        self.push_handler = Some(push_handler);
        self.routes.insert(path, (Method::GET, main_handler));
    }

    pub fn add_on_client(&mut self, callback: ClientCallback) {
        self.client_callback = Some(callback);
    }

    pub fn add_directory_handler(&mut self, handler: Box<dyn DirectoryHandler>) {
        self.directory_handler = Some(handler);
    }

    /// Returns the registered handler for `path`, or `None` meaning "fall
    /// back to the directory handler".
    pub fn handle(&self, path: &str) -> Option<Handler> {
        self.routes.get(path).map(|(_, handler)| handler.clone())
    }

    pub fn handle_push(&self) -> Option<Handler> {
        self.push_handler.clone()
    }

    pub fn get_push_path(&self) -> Option<&str> {
        self.push_path.as_deref()
    }

    pub fn client_callback(&self) -> Option<ClientCallback> {
        self.client_callback.clone()
    }

    pub fn directory_handler(&self) -> Option<&dyn DirectoryHandler> {
        self.directory_handler.as_deref()
    }

    pub fn date(&self) -> &str {
        &self.date
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats "now" as an RFC 7231 IMF-fixdate (`date` header value). Civil-date
/// math is Howard Hinnant's `civil_from_days`; no date-formatting crate is
/// pulled in for this single call site (see DESIGN.md).
fn http_date_now() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let (hour, minute, second) = (time_of_day / 3600, (time_of_day / 60) % 60, time_of_day % 60);
    let weekday = WEEKDAYS[((days % 7 + 11) % 7) as usize];

    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = if month <= 2 { y + 1 } else { y };

    format!(
        "{}, {:02} {} {:04} {:02}:{:02}:{:02} GMT",
        weekday,
        day,
        MONTHS[(month - 1) as usize],
        year,
        hour,
        minute,
        second
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> Handler {
        Arc::new(|req: Request, resp: Response| Box::pin(async move { Ok((req, resp)) }))
    }

    #[test]
    fn second_registration_replaces_first() {
        let mut router = Router::new();
        let first = noop_handler();
        let second = noop_handler();
        router.add(Method::GET, "/get", first);
        router.add(Method::GET, "/get", second.clone());
        assert!(router.handle("/get").is_some());
        assert!(router.handle("/missing").is_none());
    }

    #[test]
    fn push_path_is_recorded() {
        let mut router = Router::new();
        router.add_on_push("/push", noop_handler(), noop_handler());
        assert_eq!(router.get_push_path(), Some("/push"));
        assert!(router.handle_push().is_some());
    }
}
