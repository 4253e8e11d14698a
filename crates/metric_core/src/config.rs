//! Configuração unificada via TOML.
//!
//! Um único `config.toml` com a seção `[client]` (chave, coletor, opções do
//! protocolo) e `[poller]` (leitura dos sensores DigiTemp).

use crate::client::ClientOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuração do Client de métricas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Chave secreta (UUID ou base64)
    pub key: String,
    /// Nome da aplicação (vazio = nome do executável)
    pub application: String,
    /// `host[:port]` do coletor (vazio = coletor padrão)
    pub server: String,
    /// Assinar mensagens com HMAC
    pub authentication: bool,
    /// Esquema de criptografia do body (não implementado)
    pub encryption: Option<String>,
    /// Resolver DNS em background
    pub async_resolve: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            application: String::new(),
            server: String::new(),
            authentication: true,
            encryption: None,
            async_resolve: true,
        }
    }
}

impl ClientConfig {
    /// Converte para os parâmetros de construção do Client.
    pub fn to_options(&self) -> ClientOptions {
        ClientOptions {
            key: self.key.clone(),
            application: non_empty(&self.application),
            server: non_empty(&self.server),
            authentication: self.authentication,
            encryption: self.encryption.clone(),
            async_resolve: self.async_resolve,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Configuração da leitura dos sensores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Caminho do binário digitemp
    pub digitemp: String,
    /// Nomes das métricas, na ordem dos sensores
    pub sensors: Vec<String>,
    /// Intervalo entre leituras em segundos
    pub interval_secs: f64,
    /// Arquivo de configuração do digitemp (criado se ausente)
    pub configfile: String,
    /// Porta serial do barramento 1-Wire
    pub port: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            digitemp: "/usr/bin/digitemp_DS9097".into(),
            sensors: vec!["outside".into(), "inside".into()],
            interval_secs: 60.0,
            configfile: "digitemp.conf".into(),
            port: "/dev/ttyS0".into(),
        }
    }
}

/// Configuração raiz do aplicativo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub poller: PollerConfig,
}

impl AppConfig {
    /// Carrega configuração de um arquivo TOML.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => {
                        info!("Configuração carregada de {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        warn!("Erro ao parsear {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    warn!("Erro ao ler {}: {}", path.display(), e);
                }
            }
        }

        info!("Usando configuração padrão");
        AppConfig::default()
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        std::fs::write(path, content).map_err(|e| e.to_string())?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do config.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("config.toml")
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.client.key.is_empty() {
            errors.push("Chave do client não configurada ([client] key)".into());
        }
        if self.poller.sensors.is_empty() {
            errors.push("Nenhum sensor configurado ([poller] sensors)".into());
        }
        if self.poller.interval_secs <= 0.0 {
            errors.push(format!(
                "Intervalo do poller inválido: {} (deve ser > 0)",
                self.poller.interval_secs
            ));
        }
        if self.poller.digitemp.is_empty() {
            errors.push("Caminho do digitemp não configurado".into());
        }

        errors
    }
}
