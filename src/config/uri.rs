//! Connection URI parsing
//!
//! The registry never builds driver connection strings. It only validates the URI it is
//! handed and produces a redacted form for logs.
//!
//! Supports formats:
//! * scheme://[user[:password]@]host[:port][/database][?params]
//! * scheme://host1[:port1],host2[:port2][/database] (seed lists)
//! * scheme:///database (local, no host)
//! * scheme://[::1]:port/database (bracketed IPv6)

use crate::{Error, Result};
use std::fmt;

/// One host of a seed list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr {
    /// Hostname or IP literal (IPv6 without brackets)
    pub host: String,
    /// Explicit port, if any
    pub port: Option<u16>,
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]", self.host)?;
        } else {
            f.write_str(&self.host)?;
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// Parsed connection URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUri {
    /// URI scheme (e.g. `mongodb`, `mongodb+srv`, `cassandra`)
    pub scheme: String,
    /// Username
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Hosts; empty for local connections
    pub hosts: Vec<HostAddr>,
    /// Database / keyspace
    pub database: Option<String>,
    /// Query parameters in declaration order
    pub params: Vec<(String, String)>,
}

/// Split a query string into key/value pairs
fn parse_query_params(query_string: &str) -> Vec<(String, String)> {
    let query = query_string.trim_start_matches('?');
    if query.is_empty() {
        return Vec::new();
    }

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn parse_port(port: &str, host: &str) -> Result<u16> {
    port.parse()
        .map_err(|_| Error::Config(format!("invalid port '{}' for host '{}'", port, host)))
}

fn parse_host(entry: &str) -> Result<HostAddr> {
    if entry.is_empty() {
        return Err(Error::Config("empty host in connection URI".into()));
    }

    // Bracketed IPv6: [::1]:27017
    if let Some(rest) = entry.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::Config(format!("unterminated IPv6 host '{}'", entry)))?;
        let port = match after {
            "" => None,
            p => match p.strip_prefix(':') {
                Some(p) => Some(parse_port(p, host)?),
                None => {
                    return Err(Error::Config(format!("invalid host '{}'", entry)));
                }
            },
        };
        return Ok(HostAddr {
            host: host.to_string(),
            port,
        });
    }

    match entry.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(Error::Config(format!("missing hostname in '{}'", entry)));
            }
            Ok(HostAddr {
                host: host.to_string(),
                port: Some(parse_port(port, host)?),
            })
        }
        None => Ok(HostAddr {
            host: entry.to_string(),
            port: None,
        }),
    }
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl ConnectionUri {
    /// Parse and validate a connection URI
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Config("connection URI must contain '://'".into()))?;

        if !valid_scheme(scheme) {
            return Err(Error::Config(format!(
                "invalid connection URI scheme '{}'",
                scheme
            )));
        }

        // Split off query string before parsing authority/path
        let (rest, query_string) = match rest.find('?') {
            Some(q_pos) => rest.split_at(q_pos),
            None => (rest, ""),
        };

        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
            None => (rest, None),
        };

        // Credentials end at the last '@' so passwords may contain '@'
        let (auth, host_list) = match authority.rfind('@') {
            Some(pos) => (Some(&authority[..pos]), &authority[pos + 1..]),
            None => (None, authority),
        };

        let (user, password) = match auth {
            Some(auth) => match auth.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(auth.to_string()), None),
            },
            None => (None, None),
        };

        if user.as_deref() == Some("") {
            return Err(Error::Config("empty username in connection URI".into()));
        }

        let hosts = if host_list.is_empty() {
            Vec::new()
        } else {
            host_list
                .split(',')
                .map(parse_host)
                .collect::<Result<Vec<_>>>()?
        };

        if hosts.is_empty() && user.is_some() {
            return Err(Error::Config(
                "credentials given without a host in connection URI".into(),
            ));
        }

        let database = path.filter(|p| !p.is_empty()).map(str::to_string);

        Ok(Self {
            scheme: scheme.to_string(),
            user,
            password,
            hosts,
            database,
            params: parse_query_params(query_string),
        })
    }

    /// Render the URI with the password masked, for logs
    pub fn redacted(&self) -> String {
        let mut out = format!("{}://", self.scheme);

        if let Some(user) = &self.user {
            out.push_str(user);
            if self.password.is_some() {
                out.push_str(":****");
            }
            out.push('@');
        }

        let hosts: Vec<String> = self.hosts.iter().map(ToString::to_string).collect();
        out.push_str(&hosts.join(","));

        if let Some(database) = &self.database {
            out.push('/');
            out.push_str(database);
        } else if self.hosts.is_empty() {
            out.push('/');
        }

        if !self.params.is_empty() {
            let query: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            out.push('?');
            out.push_str(&query.join("&"));
        }

        out
    }
}
