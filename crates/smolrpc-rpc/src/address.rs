use std::fmt;
use std::net::SocketAddr;

use tokio::net::lookup_host;

/// A textual smolrpc endpoint address, resolved the way the original
/// does it: a leading `/` or `./` names a Unix domain socket path,
/// anything else is a host/port pair split at the *last* colon (so IPv6
/// literals like `::1:7000` still work).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Unix(String),
    Tcp { host: String, port: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressParseError(pub String);

impl fmt::Display for AddressParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid address {:?}: must be a unix socket path starting with / or ./, or a host:port pair", self.0)
    }
}

impl std::error::Error for AddressParseError {}

impl Address {
    pub fn parse(text: &str) -> Result<Address, AddressParseError> {
        if text.starts_with('/') || text.starts_with("./") {
            return Ok(Address::Unix(text.to_string()));
        }
        match text.rfind(':') {
            Some(i) => {
                let host = &text[..i];
                let port_text = &text[i + 1..];
                let port: u16 = port_text
                    .parse()
                    .map_err(|_| AddressParseError(text.to_string()))?;
                Ok(Address::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            None => Err(AddressParseError(text.to_string())),
        }
    }
}

/// Resolves `host:port` via the platform resolver and takes the first
/// result, rather than tokio's `ToSocketAddrs` impl for `(host, port)`
/// tuples (which tries every resolved address in turn).
pub async fn resolve_first(host: &str, port: u16) -> std::io::Result<SocketAddr> {
    lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Unix(path) => write!(f, "{path}"),
            Address::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_path_is_unix() {
        assert_eq!(
            Address::parse("/tmp/broker.sock").unwrap(),
            Address::Unix("/tmp/broker.sock".to_string())
        );
    }

    #[test]
    fn relative_dot_path_is_unix() {
        assert_eq!(
            Address::parse("./run/broker.sock").unwrap(),
            Address::Unix("./run/broker.sock".to_string())
        );
    }

    #[test]
    fn host_port_splits_at_last_colon() {
        assert_eq!(
            Address::parse("localhost:7000").unwrap(),
            Address::Tcp {
                host: "localhost".to_string(),
                port: 7000
            }
        );
        assert_eq!(
            Address::parse("::1:7000").unwrap(),
            Address::Tcp {
                host: "::1".to_string(),
                port: 7000
            }
        );
    }

    #[test]
    fn missing_colon_is_an_error() {
        assert!(Address::parse("localhost").is_err());
    }

    #[test]
    fn non_numeric_port_is_an_error() {
        assert!(Address::parse("localhost:http").is_err());
    }
}
