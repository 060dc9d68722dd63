//! Page location and connection target
//!
//! The room id is the final `/`-delimited segment of the page path and the
//! socket target lives on the same host: `/chat/123` on `http://host`
//! connects to `ws://host/ws/123?username=...`.

use url::Url;

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

/// The address of the page hosting the chat view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLocation {
    url: Url,
}

impl PageLocation {
    pub fn parse(page: &str) -> Result<Self> {
        Self::from_url(Url::parse(page)?)
    }

    pub fn from_url(url: Url) -> Result<Self> {
        if url.host_str().is_none() {
            return Err(ChatError::InvalidLocation(format!("{} has no host", url)));
        }
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(Self { url }),
            other => Err(ChatError::InvalidLocation(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    /// Host with port, as `location.host` reports it.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn is_secure(&self) -> bool {
        matches!(self.url.scheme(), "https" | "wss")
    }

    /// Final path segment; empty when the path ends with `/`.
    pub fn room_id(&self) -> &str {
        room_id_from_path(self.url.path())
    }

    /// Build the socket target for the given raw username field value.
    ///
    /// Only an empty field falls back to the configured default name; the
    /// value is otherwise used as typed.
    pub fn connection_url(&self, username_field: &str, config: &ChatConfig) -> Result<Url> {
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        let socket_path = config.socket_path.trim_matches('/');
        let base = if socket_path.is_empty() {
            format!("{}://{}/{}", scheme, self.host(), self.room_id())
        } else {
            format!(
                "{}://{}/{}/{}",
                scheme,
                self.host(),
                socket_path,
                self.room_id()
            )
        };

        let username = if username_field.is_empty() {
            config.default_username.as_str()
        } else {
            username_field
        };

        let mut url = Url::parse(&base)?;
        url.query_pairs_mut().append_pair("username", username);
        Ok(url)
    }
}

/// Final `/`-delimited segment of a path.
pub fn room_id_from_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or_default()
}

/// The room segment of a connection target built by
/// [`PageLocation::connection_url`].
pub fn room_id_from_target(target: &Url) -> Option<&str> {
    target.path_segments()?.last()
}

/// Username carried in a connection target's query string.
pub fn username_from_target(target: &Url) -> Option<String> {
    target
        .query_pairs()
        .find(|(key, _)| key == "username")
        .map(|(_, value)| value.into_owned())
}
