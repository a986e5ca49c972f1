//! Invocation configuration: host/port, timeouts, TLS mode, and GIOP version preference, built
//! via [`ConnectParamsBuilder`] or parsed from a `corba://` URL.

use crate::error::{CorbaError, CorbaResult};
use std::time::Duration;

/// Describes whether and how TLS is used underneath GIOP. This runtime treats TLS as an opaque
/// secure byte stream beneath the wire framing (§4.I); no concrete TLS stack is implemented
/// here, only the mode selection a transport layer would branch on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tls {
    /// Plain TCP connection.
    #[default]
    Off,
    /// TLS without server certificate validation.
    Insecure,
    /// TLS with server certificate validation against the given trust roots.
    Secure(Vec<String>),
}

/// Which GIOP wire version an invocation should prefer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GiopVersion {
    V1_0,
    V1_1,
    #[default]
    V1_2,
}

impl GiopVersion {
    pub fn major_minor(self) -> (u8, u8) {
        match self {
            Self::V1_0 => (1, 0),
            Self::V1_1 => (1, 1),
            Self::V1_2 => (1, 2),
        }
    }

    fn from_major_minor(major: u8, minor: u8) -> CorbaResult<Self> {
        match (major, minor) {
            (1, 0) => Ok(Self::V1_0),
            (1, 1) => Ok(Self::V1_1),
            (1, 2) => Ok(Self::V1_2),
            _ => Err(CorbaError::Usage("unsupported GIOP version")),
        }
    }
}

/// An immutable set of parameters describing how to reach and invoke a remote object.
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectParams {
    host: String,
    port: u16,
    timeout: Duration,
    tls: Tls,
    giop_version: GiopVersion,
    pull_poll_interval: Duration,
}

impl ConnectParams {
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::new()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn tls(&self) -> &Tls {
        &self.tls
    }

    pub fn giop_version(&self) -> GiopVersion {
        self.giop_version
    }

    pub fn pull_poll_interval(&self) -> Duration {
        self.pull_poll_interval
    }
}

/// A mutable, incrementally constructed precursor to [`ConnectParams`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectParamsBuilder {
    host: Option<String>,
    port: Option<u16>,
    timeout: Option<Duration>,
    tls: Tls,
    giop_version: GiopVersion,
    pull_poll_interval: Option<Duration>,
}

impl ConnectParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(&mut self, host: impl AsRef<str>) -> &mut Self {
        self.host = Some(host.as_ref().to_owned());
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tls(&mut self, tls: Tls) -> &mut Self {
        self.tls = tls;
        self
    }

    pub fn giop_version(&mut self, version: GiopVersion) -> &mut Self {
        self.giop_version = version;
        self
    }

    pub fn pull_poll_interval(&mut self, interval: Duration) -> &mut Self {
        self.pull_poll_interval = Some(interval);
        self
    }

    pub fn build(&self) -> CorbaResult<ConnectParams> {
        let host = self.host.clone().ok_or(CorbaError::Usage("hostname is required"))?;
        let port = self.port.ok_or(CorbaError::Usage("port is required"))?;
        Ok(ConnectParams {
            host,
            port,
            timeout: self.timeout.unwrap_or(Duration::from_secs(30)),
            tls: self.tls.clone(),
            giop_version: self.giop_version,
            pull_poll_interval: self.pull_poll_interval.unwrap_or(crate::event::DEFAULT_POLL_INTERVAL),
        })
    }
}

/// Converts a value into [`ConnectParams`]; implemented for `&str`/`String` via the
/// `corba://host:port?timeout=5&tls=off` URL form, for quick scripting use alongside the
/// builder.
pub trait IntoConnectParams {
    fn into_connect_params(self) -> CorbaResult<ConnectParams>;
}

impl IntoConnectParams for ConnectParams {
    fn into_connect_params(self) -> CorbaResult<ConnectParams> {
        Ok(self)
    }
}

impl IntoConnectParams for &str {
    fn into_connect_params(self) -> CorbaResult<ConnectParams> {
        let parsed = url::Url::parse(self).map_err(|e| CorbaError::UsageDetailed(e.to_string()))?;
        if parsed.scheme() != "corba" {
            return Err(CorbaError::UsageDetailed(format!("unsupported scheme {}", parsed.scheme())));
        }
        let host = parsed.host_str().ok_or(CorbaError::Usage("URL has no host"))?.to_owned();
        let port = parsed.port().ok_or(CorbaError::Usage("URL has no port"))?;

        let mut builder = ConnectParamsBuilder::new();
        builder.hostname(host).port(port);

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| CorbaError::UsageDetailed(format!("bad timeout value {value}")))?;
                    builder.timeout(Duration::from_secs(secs));
                }
                "tls" => {
                    let tls = match value.as_ref() {
                        "off" => Tls::Off,
                        "insecure" => Tls::Insecure,
                        other => {
                            return Err(CorbaError::UsageDetailed(format!("unsupported tls mode {other}")))
                        }
                    };
                    builder.tls(tls);
                }
                "giop" => {
                    let version = match value.as_ref() {
                        "1.0" => GiopVersion::V1_0,
                        "1.1" => GiopVersion::V1_1,
                        "1.2" => GiopVersion::V1_2,
                        other => {
                            return Err(CorbaError::UsageDetailed(format!("unsupported giop version {other}")))
                        }
                    };
                    builder.giop_version(version);
                }
                _ => {}
            }
        }

        builder.build()
    }
}

impl IntoConnectParams for String {
    fn into_connect_params(self) -> CorbaResult<ConnectParams> {
        self.as_str().into_connect_params()
    }
}
