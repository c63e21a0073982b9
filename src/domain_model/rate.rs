use std::fmt;
use std::net::SocketAddr;

/// Rate-limited route classes. Each class carries its own threshold;
/// login is stricter than the rest.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RouteClass {
    Login,
    Refresh,
    Mfa,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Login => "login",
            RouteClass::Refresh => "refresh",
            RouteClass::Mfa => "mfa",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client identity for rate limiting. Derived from the peer address; a
/// missing address collapses into one shared bucket.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn from_remote(addr: Option<SocketAddr>) -> Self {
        match addr {
            Some(addr) => ClientKey(addr.ip().to_string()),
            None => ClientKey("unknown".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
