//! Connection security profiles.
//!
//! Derives how a subscription authenticates and encrypts its broker
//! connection from the handler settings:
//!
//! | `truststore` | `user`/`password` | Profile        | `security.protocol` |
//! |--------------|-------------------|----------------|---------------------|
//! | -            | -                 | `None`         | `PLAINTEXT`         |
//! | set          | -                 | `Tls`          | `SSL`               |
//! | -            | set               | `Sasl`         | `SASL_PLAINTEXT`    |
//! | set          | set               | `SaslTls`      | `SASL_SSL`          |
//!
//! Nothing here touches the filesystem or the network. A missing truststore
//! or rejected credentials surface when the subscription opens.
//!
//! # Example
//!
//! ```rust
//! use kafkasub::config::HandlerConfig;
//! use kafkasub::trigger::security::{SecurityProfile, SecurityProtocol};
//!
//! let handler = HandlerConfig::new("kafka_message", "syslog")
//!     .with_setting("truststore", "/opt/kafka/keys/trust.pem");
//!
//! let profile = SecurityProfile::from_settings(&handler.settings, None).unwrap();
//! assert_eq!(profile.protocol(), SecurityProtocol::Ssl);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::config::keys;
use crate::error::{Result, TriggerError};

/// Security protocol for Kafka connection.
///
/// Determines how the client connects to Kafka brokers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// No encryption or authentication.
    #[default]
    Plaintext,
    /// TLS encryption without SASL.
    Ssl,
    /// SASL authentication without TLS.
    SaslPlaintext,
    /// SASL authentication with TLS encryption.
    SaslSsl,
}

impl SecurityProtocol {
    /// Returns the Kafka configuration string for this protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaslMechanism {
    /// PLAIN mechanism (username/password in clear text).
    #[default]
    Plain,
    /// SCRAM-SHA-256 mechanism.
    ScramSha256,
    /// SCRAM-SHA-512 mechanism.
    ScramSha512,
}

impl SaslMechanism {
    /// Returns the Kafka configuration string for this mechanism.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }

    /// Parses a mechanism name, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` for unknown mechanisms
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM-SHA-256" => Ok(Self::ScramSha256),
            "SCRAM-SHA-512" => Ok(Self::ScramSha512),
            _ => Err(TriggerError::Config(format!(
                "Invalid SASL mechanism: {}",
                name
            ))),
        }
    }
}

/// SASL credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SaslCredentials {
    /// Authentication mechanism to use.
    pub mechanism: SaslMechanism,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
}

impl fmt::Debug for SaslCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaslCredentials")
            .field("mechanism", &self.mechanism)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How a subscription secures its broker connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SecurityProfile {
    /// Plaintext, unauthenticated.
    #[default]
    None,
    /// TLS verified against a CA truststore.
    Tls {
        /// Path to the CA certificate bundle.
        truststore: String,
    },
    /// SASL over plaintext.
    Sasl(SaslCredentials),
    /// SASL over TLS.
    SaslTls {
        /// SASL credentials.
        credentials: SaslCredentials,
        /// Path to the CA certificate bundle.
        truststore: String,
    },
}

impl SecurityProfile {
    /// Builds the profile from handler settings.
    ///
    /// `env_password` is used when `user` is set without `password`; the
    /// trigger passes the value of `KAFKA_SASL_PASSWORD` here.
    ///
    /// # Errors
    ///
    /// Returns `TriggerError::Config` if only one of `user`/`password` is
    /// available or `mechanism` names an unknown mechanism
    pub fn from_settings(
        settings: &BTreeMap<String, String>,
        env_password: Option<String>,
    ) -> Result<Self> {
        let get = |key: &str| {
            settings
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        let truststore = get(keys::TRUSTSTORE).map(str::to_string);
        let username = get(keys::USER).map(str::to_string);
        let password = get(keys::PASSWORD)
            .map(str::to_string)
            .or_else(|| username.as_ref().and(env_password));

        let credentials = match (username, password) {
            (None, None) => None,
            (Some(username), Some(password)) => {
                let mechanism = match get(keys::MECHANISM) {
                    Some(name) => SaslMechanism::parse(name)?,
                    None => SaslMechanism::default(),
                };
                Some(SaslCredentials {
                    mechanism,
                    username,
                    password,
                })
            }
            (Some(_), None) => {
                return Err(TriggerError::Config(format!(
                    "SASL '{}' is set but no '{}' was given",
                    keys::USER,
                    keys::PASSWORD
                )))
            }
            (None, Some(_)) => {
                return Err(TriggerError::Config(format!(
                    "SASL '{}' is set but no '{}' was given",
                    keys::PASSWORD,
                    keys::USER
                )))
            }
        };

        Ok(match (credentials, truststore) {
            (None, None) => Self::None,
            (None, Some(truststore)) => Self::Tls { truststore },
            (Some(credentials), None) => Self::Sasl(credentials),
            (Some(credentials), Some(truststore)) => Self::SaslTls {
                credentials,
                truststore,
            },
        })
    }

    /// Returns the protocol this profile connects with.
    pub fn protocol(&self) -> SecurityProtocol {
        match self {
            Self::None => SecurityProtocol::Plaintext,
            Self::Tls { .. } => SecurityProtocol::Ssl,
            Self::Sasl(_) => SecurityProtocol::SaslPlaintext,
            Self::SaslTls { .. } => SecurityProtocol::SaslSsl,
        }
    }

    /// Returns the SASL credentials, if any.
    pub fn credentials(&self) -> Option<&SaslCredentials> {
        match self {
            Self::Sasl(credentials) | Self::SaslTls { credentials, .. } => Some(credentials),
            _ => None,
        }
    }

    /// Returns the truststore path, if any.
    pub fn truststore(&self) -> Option<&str> {
        match self {
            Self::Tls { truststore } | Self::SaslTls { truststore, .. } => {
                Some(truststore.as_str())
            }
            _ => None,
        }
    }

    /// Returns the client settings for this profile as key-value pairs.
    pub fn client_settings(&self) -> Vec<(String, String)> {
        let mut settings = vec![(
            "security.protocol".to_string(),
            self.protocol().as_str().to_string(),
        )];

        if let Some(sasl) = self.credentials() {
            settings.push((
                "sasl.mechanism".to_string(),
                sasl.mechanism.as_str().to_string(),
            ));
            settings.push(("sasl.username".to_string(), sasl.username.clone()));
            settings.push(("sasl.password".to_string(), sasl.password.clone()));
        }

        if let Some(ca) = self.truststore() {
            settings.push(("ssl.ca.location".to_string(), ca.to_string()));
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_security_settings() {
        let profile = SecurityProfile::from_settings(&settings(&[("Topic", "syslog")]), None)
            .unwrap();
        assert_eq!(profile, SecurityProfile::None);
        assert_eq!(profile.protocol(), SecurityProtocol::Plaintext);
    }

    #[test]
    fn test_truststore_only_is_tls() {
        let profile = SecurityProfile::from_settings(
            &settings(&[("truststore", "/opt/kafka/keys/trust")]),
            None,
        )
        .unwrap();
        assert_eq!(
            profile,
            SecurityProfile::Tls {
                truststore: "/opt/kafka/keys/trust".to_string()
            }
        );
        assert_eq!(profile.protocol(), SecurityProtocol::Ssl);
    }

    #[test]
    fn test_user_password_is_sasl() {
        let profile = SecurityProfile::from_settings(
            &settings(&[("user", "wcn00"), ("password", "sauron")]),
            None,
        )
        .unwrap();
        assert_eq!(profile.protocol(), SecurityProtocol::SaslPlaintext);
        let sasl = profile.credentials().unwrap();
        assert_eq!(sasl.mechanism, SaslMechanism::Plain);
        assert_eq!(sasl.username, "wcn00");
        assert_eq!(sasl.password, "sauron");
        assert!(profile.truststore().is_none());
    }

    #[test]
    fn test_all_three_is_sasl_tls() {
        let profile = SecurityProfile::from_settings(
            &settings(&[
                ("truststore", "/opt/kafka/keys/trust"),
                ("user", "wcn00"),
                ("password", "sauron"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(profile.protocol(), SecurityProtocol::SaslSsl);
        assert_eq!(profile.truststore(), Some("/opt/kafka/keys/trust"));
        assert_eq!(profile.credentials().unwrap().username, "wcn00");
    }

    #[test]
    fn test_user_without_password_uses_env_fallback() {
        let profile = SecurityProfile::from_settings(
            &settings(&[("user", "wcn00")]),
            Some("from-env".to_string()),
        )
        .unwrap();
        assert_eq!(profile.credentials().unwrap().password, "from-env");
    }

    #[test]
    fn test_env_password_ignored_without_user() {
        let profile =
            SecurityProfile::from_settings(&settings(&[]), Some("from-env".to_string())).unwrap();
        assert_eq!(profile, SecurityProfile::None);
    }

    #[test]
    fn test_user_without_password_is_error() {
        let result = SecurityProfile::from_settings(&settings(&[("user", "wcn00")]), None);
        assert!(matches!(result, Err(TriggerError::Config(_))));
    }

    #[test]
    fn test_password_without_user_is_error() {
        let result = SecurityProfile::from_settings(&settings(&[("password", "sauron")]), None);
        assert!(matches!(result, Err(TriggerError::Config(_))));
    }

    #[test]
    fn test_scram_mechanism() {
        let profile = SecurityProfile::from_settings(
            &settings(&[
                ("user", "u"),
                ("password", "p"),
                ("mechanism", "scram-sha-512"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(
            profile.credentials().unwrap().mechanism,
            SaslMechanism::ScramSha512
        );
    }

    #[test]
    fn test_unknown_mechanism_is_error() {
        let result = SecurityProfile::from_settings(
            &settings(&[("user", "u"), ("password", "p"), ("mechanism", "GSSAPI")]),
            None,
        );
        assert!(matches!(result, Err(TriggerError::Config(_))));
    }

    #[test]
    fn test_client_settings_sasl_tls() {
        let profile = SecurityProfile::from_settings(
            &settings(&[
                ("truststore", "/path/to/ca.pem"),
                ("user", "user"),
                ("password", "pass"),
            ]),
            None,
        )
        .unwrap();

        let map: HashMap<_, _> = profile.client_settings().into_iter().collect();
        assert_eq!(map.get("security.protocol").unwrap(), "SASL_SSL");
        assert_eq!(map.get("sasl.mechanism").unwrap(), "PLAIN");
        assert_eq!(map.get("sasl.username").unwrap(), "user");
        assert_eq!(map.get("sasl.password").unwrap(), "pass");
        assert_eq!(map.get("ssl.ca.location").unwrap(), "/path/to/ca.pem");
    }

    #[test]
    fn test_client_settings_plaintext() {
        let map: HashMap<_, _> = SecurityProfile::None
            .client_settings()
            .into_iter()
            .collect();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("security.protocol").unwrap(), "PLAINTEXT");
    }

    #[test]
    fn test_debug_hides_password() {
        let profile = SecurityProfile::from_settings(
            &settings(&[("user", "wcn00"), ("password", "sauron")]),
            None,
        )
        .unwrap();
        let rendered = format!("{:?}", profile);
        assert!(rendered.contains("wcn00"));
        assert!(!rendered.contains("sauron"));
    }

    #[test]
    fn test_security_protocol_as_str() {
        assert_eq!(SecurityProtocol::Plaintext.as_str(), "PLAINTEXT");
        assert_eq!(SecurityProtocol::Ssl.as_str(), "SSL");
        assert_eq!(SecurityProtocol::SaslPlaintext.as_str(), "SASL_PLAINTEXT");
        assert_eq!(SecurityProtocol::SaslSsl.as_str(), "SASL_SSL");
    }

    #[test]
    fn test_sasl_mechanism_as_str() {
        assert_eq!(SaslMechanism::Plain.as_str(), "PLAIN");
        assert_eq!(SaslMechanism::ScramSha256.as_str(), "SCRAM-SHA-256");
        assert_eq!(SaslMechanism::ScramSha512.as_str(), "SCRAM-SHA-512");
    }
}
