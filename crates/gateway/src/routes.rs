//! Request path classification for the access gate.
//!
//! Classification is a pure function of the path and the configured
//! namespaces. Namespace matching is segment-aware: `/admin` covers `/admin`
//! and `/admin/...` but not `/administrator`.
//!
//! Paths are matched in [`canonical`] form, the way the renderer will route
//! them, so encoded or doubled separators cannot step around a namespace.

use serde::Serialize;

use crate::config::GateConfig;

/// File extensions served as static assets; such paths skip the gate.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "ico", "webp", "avif", "woff", "woff2", "ttf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Anything outside the managed namespaces
    Public,
    /// The bare `/`
    Root,
    /// Login and password-reset pages
    Auth,
    /// Password update page reached from a recovery email
    Recovery,
    /// The sign-out endpoint
    SignOut,
    Admin,
    User,
}

impl RouteClass {
    /// Namespaces that require an authenticated user.
    pub fn is_protected(self) -> bool {
        matches!(self, RouteClass::Admin | RouteClass::User)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    login_path: String,
    auth_prefixes: Vec<String>,
    recovery_paths: Vec<String>,
    admin_prefix: String,
    user_prefix: String,
    signout_path: String,
    excluded_prefixes: Vec<String>,
}

impl RouteTable {
    pub fn from_config(config: &GateConfig) -> Self {
        Self {
            login_path: normalize(&config.login_path).to_string(),
            auth_prefixes: config.auth_prefixes.iter().map(|p| normalize(p).to_string()).collect(),
            recovery_paths: config.recovery_paths.iter().map(|p| normalize(p).to_string()).collect(),
            admin_prefix: normalize(&config.admin_prefix).to_string(),
            user_prefix: normalize(&config.user_prefix).to_string(),
            signout_path: normalize(&config.signout_path).to_string(),
            excluded_prefixes: config.excluded_prefixes.iter().map(|p| normalize(p).to_string()).collect(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn admin_landing(&self) -> &str {
        &self.admin_prefix
    }

    pub fn user_landing(&self) -> &str {
        &self.user_prefix
    }

    pub fn signout_path(&self) -> &str {
        &self.signout_path
    }

    /// Paths matched out before the gate evaluates anything.
    ///
    /// Static file extensions only count outside the protected namespaces.
    pub fn is_excluded(&self, path: &str) -> bool {
        let canonical = canonical(path);
        if self.excluded_prefixes.iter().any(|prefix| is_under(&canonical, prefix)) {
            return true;
        }
        if self.classify(path).is_protected() {
            return false;
        }
        canonical
            .rsplit('/')
            .next()
            .and_then(|segment| segment.rsplit_once('.'))
            .map(|(_, ext)| STATIC_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// The raw request path hits the sign-out route itself, with or without
    /// a trailing slash.
    pub fn is_signout_endpoint(&self, path: &str) -> bool {
        path == self.signout_path || path.strip_suffix('/') == Some(self.signout_path.as_str())
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let canonical = canonical(path);
        let raw = path;
        let path = canonical.as_str();
        if path == "/" {
            return RouteClass::Root;
        }
        // Spellings the router does not serve fall through to the auth namespace
        if path == self.signout_path && self.is_signout_endpoint(raw) {
            return RouteClass::SignOut;
        }
        if self.recovery_paths.iter().any(|p| is_under(path, p)) {
            return RouteClass::Recovery;
        }
        if is_under(path, &self.admin_prefix) {
            return RouteClass::Admin;
        }
        if is_under(path, &self.user_prefix) {
            return RouteClass::User;
        }
        if is_under(path, &self.login_path) || self.auth_prefixes.iter().any(|p| is_under(path, p)) {
            return RouteClass::Auth;
        }
        RouteClass::Public
    }
}

/// `path` equals `prefix` or continues it with a `/` segment boundary.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Request path as the renderer routes it: percent-decoded once, `\\`
/// read as `/`, empty and `.` segments dropped, `..` resolved.
pub fn canonical(path: &str) -> String {
    let decoded = urlencoding::decode_binary(path.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Strip a trailing slash (except for the root).
fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
