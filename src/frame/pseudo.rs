use http::{Method, StatusCode};

/// The pseudo-header set carried by a HEADERS or PUSH_PROMISE frame.
///
/// Mirrors `:method`/`:scheme`/`:authority`/`:path` for requests and `:status`
/// for responses, materialized as typed fields rather than left in the
/// generic header list (SPEC_FULL.md §9, "Pseudo-header handling").
#[derive(Debug, Clone, Default)]
pub struct Pseudo {
    pub method: Option<Method>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub status: Option<StatusCode>,
}

impl Pseudo {
    pub fn request(method: Method, path: impl Into<String>, scheme: impl Into<String>) -> Pseudo {
        Pseudo {
            method: Some(method),
            scheme: Some(scheme.into()),
            authority: None,
            path: Some(path.into()),
            status: None,
        }
    }

    pub fn response(status: StatusCode) -> Pseudo {
        Pseudo {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Sets the field named by a pseudo-header, returning `true` if `name`
    /// was recognized as one of the four pseudo-headers.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match name {
            ":method" => {
                self.method = Method::from_bytes(value.as_bytes()).ok();
                true
            }
            ":scheme" => {
                self.scheme = Some(value.to_string());
                true
            }
            ":authority" => {
                self.authority = Some(value.to_string());
                true
            }
            ":path" => {
                self.path = Some(value.to_string());
                true
            }
            ":status" => {
                self.status = StatusCode::from_bytes(value.as_bytes()).ok();
                true
            }
            _ => false,
        }
    }

    /// The pseudo-headers in wire order, as they must appear first in a
    /// compiled header block.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(4);
        if let Some(method) = &self.method {
            out.push((":method".to_string(), method.as_str().to_string()));
        }
        if let Some(scheme) = &self.scheme {
            out.push((":scheme".to_string(), scheme.clone()));
        }
        if let Some(authority) = &self.authority {
            out.push((":authority".to_string(), authority.clone()));
        }
        if let Some(path) = &self.path {
            out.push((":path".to_string(), path.clone()));
        }
        if let Some(status) = &self.status {
            out.push((":status".to_string(), status.as_str().to_string()));
        }
        out
    }
}
