use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;

use sql_replay_shared::{ReplayError, Result};

const DEFAULT_PORT: u16 = 5432;

/// Connection settings for one replay target.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetConfig {
    pub addr: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub db_name: String,
    #[serde(default)]
    pub charset: Option<String>,
}

// Keeps the password out of logs.
impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("addr", &self.addr)
            .field("user", &self.user)
            .field("password", &"***")
            .field("db_name", &self.db_name)
            .field("charset", &self.charset)
            .finish()
    }
}

impl TargetConfig {
    /// Splits `addr` into host and port. A bare host or a unix socket
    /// directory gets the default port.
    pub fn host_port(&self) -> Result<(String, u16)> {
        if self.addr.starts_with('/') {
            return Ok((self.addr.clone(), DEFAULT_PORT));
        }
        match self.addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| ReplayError::Config(format!("invalid port in address '{}'", self.addr)))?;
                if host.is_empty() {
                    return Err(ReplayError::Config(format!("missing host in address '{}'", self.addr)));
                }
                Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
            }
            None if !self.addr.is_empty() => Ok((self.addr.clone(), DEFAULT_PORT)),
            None => Err(ReplayError::Config("empty address".into())),
        }
    }
}

/// The one or two targets a replay runs against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Targets {
    pub primary: TargetConfig,
    pub secondary: Option<TargetConfig>,
}

impl Targets {
    pub fn single(primary: TargetConfig) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn comparison(primary: TargetConfig, secondary: TargetConfig) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.secondary.is_some()
    }

    /// Reads a stream of one or two JSON target objects. With `single_only`
    /// only the first one is used.
    pub fn from_reader<R: Read>(reader: R, single_only: bool) -> Result<Self> {
        let mut configs = serde_json::Deserializer::from_reader(reader).into_iter::<TargetConfig>();

        let primary = configs
            .next()
            .ok_or_else(|| ReplayError::Config("no target configuration found".into()))??;
        if single_only {
            return Ok(Self::single(primary));
        }

        let secondary = configs.next().transpose()?;
        if configs.next().is_some() {
            return Err(ReplayError::Config(
                "at most two target configurations are supported".into(),
            ));
        }

        Ok(Self { primary, secondary })
    }

    pub fn load<P: AsRef<Path>>(path: P, single_only: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ReplayError::Config(format!("cannot open '{}': {}", path.display(), e)))?;
        Self::from_reader(std::io::BufReader::new(file), single_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_TARGETS: &str = r#"
        {"Addr": "10.0.0.1:5432", "User": "replay", "Password": "secret", "DbName": "app"}
        {"Addr": "10.0.0.2:6432", "User": "replay", "Password": "secret", "DbName": "app", "Charset": "UTF8"}
    "#;

    #[test]
    fn test_two_targets_mean_comparison() {
        let targets = Targets::from_reader(TWO_TARGETS.as_bytes(), false).unwrap();
        assert!(targets.is_comparison());
        assert_eq!(targets.primary.addr, "10.0.0.1:5432");
        let secondary = targets.secondary.unwrap();
        assert_eq!(secondary.charset.as_deref(), Some("UTF8"));
        assert_eq!(secondary.host_port().unwrap(), ("10.0.0.2".to_string(), 6432));
    }

    #[test]
    fn test_single_only() {
        let targets = Targets::from_reader(TWO_TARGETS.as_bytes(), true).unwrap();
        assert!(!targets.is_comparison());
    }

    #[test]
    fn test_one_target() {
        let json = r#"{"Addr": "db", "User": "u", "DbName": "d"}"#;
        let targets = Targets::from_reader(json.as_bytes(), false).unwrap();
        assert!(!targets.is_comparison());
        assert_eq!(targets.primary.password, "");
        assert_eq!(targets.primary.host_port().unwrap(), ("db".to_string(), 5432));
    }

    #[test]
    fn test_rejects_empty_and_three() {
        assert!(matches!(Targets::from_reader("".as_bytes(), false), Err(ReplayError::Config(_))));

        let three = format!("{}{}", TWO_TARGETS, r#"{"Addr": "x:1", "User": "u", "DbName": "d"}"#);
        assert!(matches!(Targets::from_reader(three.as_bytes(), false), Err(ReplayError::Config(_))));
    }

    #[test]
    fn test_bad_port() {
        let target = TargetConfig {
            addr: "db:notaport".into(),
            user: "u".into(),
            password: String::new(),
            db_name: "d".into(),
            charset: None,
        };
        assert!(target.host_port().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let targets = Targets::from_reader(TWO_TARGETS.as_bytes(), true).unwrap();
        assert!(!format!("{:?}", targets).contains("secret"));
    }
}
