//! Identidade de quem envia as métricas.

use crate::key::AuthKey;
use tracing::warn;

/// Valor usado quando hostname ou nome da aplicação não podem ser obtidos.
pub const UNKNOWN: &str = "unknown";

/// Quem envia: fingerprint, aplicação e hostname. Imutável após a construção.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub key_fingerprint: String,
    pub application: String,
    pub hostname: String,
}

impl Identity {
    /// Resolve a identidade do processo atual.
    ///
    /// Sem `application`, usa `argv[0]`. O hostname é consultado uma vez aqui.
    pub fn resolve(key: &AuthKey, application: Option<&str>) -> Self {
        Self {
            key_fingerprint: key.fingerprint(),
            application: application_name(application),
            hostname: system_hostname(),
        }
    }
}

fn application_name(application: Option<&str>) -> String {
    match application {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => std::env::args()
            .next()
            .filter(|arg| !arg.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn system_hostname() -> String {
    hostname_or_unknown(sysinfo::System::host_name())
}

fn hostname_or_unknown(name: Option<String>) -> String {
    match name {
        Some(name) if !name.is_empty() => name,
        _ => {
            warn!("Não foi possível determinar o hostname do sistema. Usando \"{UNKNOWN}\"");
            UNKNOWN.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::parse_credential;

    #[test]
    fn explicit_application_wins() {
        let key = parse_credential("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let identity = Identity::resolve(&key, Some("weather-station"));
        assert_eq!(identity.application, "weather-station");
        assert_eq!(identity.key_fingerprint, key.fingerprint());
        assert!(!identity.hostname.is_empty());
    }

    #[test]
    fn missing_hostname_uses_sentinel() {
        assert_eq!(hostname_or_unknown(None), UNKNOWN);
        assert_eq!(hostname_or_unknown(Some(String::new())), UNKNOWN);
        assert_eq!(hostname_or_unknown(Some("sensor-box".into())), "sensor-box");
    }

    #[test]
    fn empty_application_falls_back_to_argv0() {
        let name = application_name(Some(""));
        assert!(!name.is_empty());
        assert_eq!(name, application_name(None));
    }
}
