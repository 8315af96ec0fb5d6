use crate::{Result, TransportError};
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// Port assumed when an endpoint is given as a bare host.
pub const DEFAULT_PORT: u16 = 4840;

const SCHEME: &str = "opc.tcp://";

/// Wire-level type of a controller variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TypeTag {
    Bool,
    UInt16,
    Int32,
    Float,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::UInt16 => "uint16",
            TypeTag::Int32 => "int32",
            TypeTag::Float => "float",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = String;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(TypeTag::Bool),
            "uint16" | "u16" => Ok(TypeTag::UInt16),
            "int32" | "i32" => Ok(TypeTag::Int32),
            "float" | "f32" => Ok(TypeTag::Float),
            other => Err(other.to_string()),
        }
    }
}

/// A raw scalar exchanged with the controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    UInt16(u16),
    Int32(i32),
    Float(f32),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::UInt16(_) => TypeTag::UInt16,
            Value::Int32(_) => TypeTag::Int32,
            Value::Float(_) => TypeTag::Float,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match *self {
            Value::UInt16(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Controller address: a bare host (older deployments) or a full `opc.tcp://` URL.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Endpoint {
    Host { host: String, port: u16 },
    Url(String),
}

impl Endpoint {
    pub fn parse(s: &str) -> Result<Self> {
        let t = s.trim();
        if t.is_empty() {
            return Err(TransportError::InvalidEndpoint("empty".into()));
        }
        if let Some(idx) = t.find("://") {
            let (scheme, rest) = t.split_at(idx + 3);
            if !scheme.eq_ignore_ascii_case(SCHEME) {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme in {t}"
                )));
            }
            if rest.is_empty() {
                return Err(TransportError::InvalidEndpoint(format!("missing host in {t}")));
            }
            return Ok(Endpoint::Url(t.to_string()));
        }
        let (host, port) = match t.rsplit_once(':') {
            Some((h, p)) => {
                let port = p
                    .parse::<u16>()
                    .map_err(|_| TransportError::InvalidEndpoint(format!("bad port in {t}")))?;
                (h, port)
            }
            None => (t, DEFAULT_PORT),
        };
        if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == '/' || c == ':')
        {
            return Err(TransportError::InvalidEndpoint(format!("bad host in {t}")));
        }
        Ok(Endpoint::Host {
            host: host.to_string(),
            port,
        })
    }

    /// Full endpoint URL handed to the protocol stack.
    pub fn url(&self) -> String {
        match self {
            Endpoint::Host { host, port } => format!("{SCHEME}{host}:{port}"),
            Endpoint::Url(url) => url.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(OffsetDateTime::now_utc())
    }
}

/// A data change delivered by a subscription.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub path: String,
    pub value: Value,
    pub timestamp: Option<Timestamp>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubscriptionEvent {
    DataChange(Notification),
    /// Connection state reported by the subscription machinery.
    Status { good: bool, code: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(pub u32);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Receives subscription events on the backend's delivery thread.
pub type EventSink = Arc<dyn Fn(SubscriptionEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_default_port() {
        let ep = Endpoint::parse("10.129.4.73").unwrap();
        assert_eq!(
            ep,
            Endpoint::Host {
                host: "10.129.4.73".into(),
                port: DEFAULT_PORT
            }
        );
        assert_eq!(ep.url(), "opc.tcp://10.129.4.73:4840");
    }

    #[test]
    fn host_with_port() {
        let ep = Endpoint::parse("plc.local:4841").unwrap();
        assert_eq!(ep.url(), "opc.tcp://plc.local:4841");
    }

    #[test]
    fn url_is_kept_verbatim() {
        let ep = Endpoint::parse(" opc.tcp://10.129.4.74:4840 ").unwrap();
        assert_eq!(ep, Endpoint::Url("opc.tcp://10.129.4.74:4840".into()));
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(Endpoint::parse("").is_err());
        assert!(Endpoint::parse("http://10.0.0.1").is_err());
        assert!(Endpoint::parse("opc.tcp://").is_err());
        assert!(Endpoint::parse("10.0.0.1:port").is_err());
        assert!(Endpoint::parse("a b").is_err());
    }

    #[test]
    fn type_tags_parse_case_insensitively() {
        assert_eq!("Float".parse::<TypeTag>(), Ok(TypeTag::Float));
        assert_eq!("uint16".parse::<TypeTag>(), Ok(TypeTag::UInt16));
        assert_eq!("double".parse::<TypeTag>(), Err("double".to_string()));
    }

    #[test]
    fn value_accessors_are_strict() {
        let v = Value::UInt16(7);
        assert_eq!(v.as_u16(), Some(7));
        assert_eq!(v.as_i32(), None);
        assert_eq!(Value::Bool(true).as_f32(), None);
    }
}
