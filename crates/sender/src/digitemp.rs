//! Leitura dos sensores 1-Wire via binário externo `digitemp`.
//!
//! - Sem arquivo de configuração, roda `digitemp -i -c <conf> -q -s <porta>`
//!   para varrer o barramento e criá-lo.
//! - Cada leitura roda `digitemp -a -c <conf> -q -o %C` e interpreta a saída
//!   como uma temperatura (°C) por sensor, separadas por espaço/linha.

use metric_core::MetricSink;
use metric_core::config::PollerConfig;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::{debug, info};

/// Erros ao executar ou interpretar o digitemp.
#[derive(Debug, thiserror::Error)]
pub enum DigitempError {
    #[error("Falha ao executar {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("{0} terminou com {1}: {2}")]
    Failed(String, std::process::ExitStatus, String),

    #[error("Valor de temperatura inválido: {0:?}")]
    Parse(String),
}

/// Acesso ao binário digitemp configurado.
#[derive(Debug, Clone)]
pub struct DigiTemp {
    binary: PathBuf,
    configfile: PathBuf,
    port: String,
}

impl DigiTemp {
    pub fn from_config(config: &PollerConfig) -> Self {
        let configfile = PathBuf::from(&config.configfile);
        let configfile = std::path::absolute(&configfile).unwrap_or(configfile);
        Self {
            binary: PathBuf::from(&config.digitemp),
            configfile,
            port: config.port.clone(),
        }
    }

    pub fn configfile(&self) -> &Path {
        &self.configfile
    }

    /// Cria o arquivo de configuração do digitemp se ele não existir.
    pub fn ensure_config_file(&self) -> Result<(), DigitempError> {
        if self.configfile.exists() {
            debug!("Usando arquivo do digitemp existente: {}", self.configfile.display());
            return Ok(());
        }

        info!("Criando arquivo do digitemp {}", self.configfile.display());
        self.run(&[
            OsStr::new("-i"),
            OsStr::new("-c"),
            self.configfile.as_os_str(),
            OsStr::new("-q"),
            OsStr::new("-s"),
            OsStr::new(&self.port),
        ])?;
        Ok(())
    }

    /// Lê todos os sensores. Uma temperatura (°C) por sensor, na ordem do barramento.
    pub fn read_temperatures(&self) -> Result<Vec<f64>, DigitempError> {
        let output = self.run(&[
            OsStr::new("-a"),
            OsStr::new("-c"),
            self.configfile.as_os_str(),
            OsStr::new("-q"),
            OsStr::new("-o"),
            OsStr::new("%C"),
        ])?;
        parse_temperatures(&String::from_utf8_lossy(&output.stdout))
    }

    fn run(&self, args: &[&OsStr]) -> Result<Output, DigitempError> {
        let name = self.binary.display().to_string();
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| DigitempError::Spawn(name.clone(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DigitempError::Failed(name, output.status, stderr));
        }
        Ok(output)
    }
}

/// Interpreta a saída do digitemp (`%C`): floats finitos separados por espaço.
pub fn parse_temperatures(output: &str) -> Result<Vec<f64>, DigitempError> {
    output
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| DigitempError::Parse(token.to_string()))
        })
        .collect()
}

/// Envia cada temperatura com o nome do sensor correspondente.
///
/// Pareamento posicional: valores ou nomes excedentes são ignorados.
pub fn send_temperatures<S: MetricSink + ?Sized>(sink: &S, names: &[String], values: &[f64]) {
    for (name, temp) in names.iter().zip(values) {
        debug!("Enviando temperatura {name}: {temp:.2}°C");
        sink.send(name, *temp, None);
    }
}
