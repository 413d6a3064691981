//! File-backed cookie jar.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::base::error::ClientError;
use crate::cookies::cookie::Cookie;
use crate::cookies::jar::CookieJar;

/// A [`CookieJar`] persisted to a JSON file. Cookies are loaded on open
/// and written back on [`save`](FileCookieJar::save) and on drop. Session
/// cookies and cookies marked `Discard` are never persisted.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    jar: CookieJar,
}

impl FileCookieJar {
    /// Open a jar backed by `path`, loading any cookies already stored
    /// there. A missing file starts an empty jar.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let mut jar = CookieJar::new();
        match fs::read_to_string(&path) {
            Ok(data) if !data.trim().is_empty() => {
                let cookies: Vec<Cookie> = serde_json::from_str(&data).map_err(|e| {
                    ClientError::transport(-1, format!("corrupt cookie file: {e}"))
                })?;
                for cookie in cookies {
                    jar.add(cookie);
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ClientError::io("read cookie file", &e)),
        }
        Ok(Self { path, jar })
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn jar_mut(&mut self) -> &mut CookieJar {
        &mut self.jar
    }

    /// Write persistent cookies back to the file.
    pub fn save(&self) -> Result<(), ClientError> {
        let persistent: Vec<&Cookie> = self
            .jar
            .iter()
            .filter(|c| !c.discard && c.expires.is_some())
            .collect();
        let data = serde_json::to_string_pretty(&persistent)
            .map_err(|e| ClientError::transport(-1, format!("serialize cookies: {e}")))?;
        fs::write(&self.path, data).map_err(|e| ClientError::io("write cookie file", &e))
    }
}

impl Drop for FileCookieJar {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            warn!(path = %self.path.display(), error = %e, "failed to persist cookie jar");
        }
    }
}
