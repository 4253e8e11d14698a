//! # DigiTemp Sender
//!
//! Lê sensores de temperatura 1-Wire via `digitemp` e envia cada valor ao
//! coletor de métricas pelo [`metric_core::Client`]. Roda até ser
//! interrompido (ctrl-c).
//!
//! ## Uso
//! ```bash
//! digitemp_sender              # Loop contínuo
//! digitemp_sender --once       # Uma leitura e sai (cron)
//! digitemp_sender --quiet      # Apenas erros no log
//! ```

mod digitemp;

use digitemp::{DigiTemp, send_temperatures};
use metric_core::Client;
use metric_core::config::AppConfig;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
    let once = std::env::args().any(|a| a == "--once");
    let quiet = std::env::args().any(|a| a == "--quiet");

    // ── Logging ──
    let default_level = if quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    // ── Carregar config ──
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path);

    // Salva config padrão se não existir
    if !config_path.exists() {
        if let Err(e) = config.save(&config_path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Config inválida ({}): {e}", config_path.display());
        }
        return ExitCode::FAILURE;
    }

    // ── Sensores ──
    let sensors = DigiTemp::from_config(&config.poller);
    if let Err(e) = sensors.ensure_config_file() {
        error!("Falha ao preparar o digitemp: {e}");
        return ExitCode::FAILURE;
    }

    // ── Client de métricas ──
    debug!("Inicializando client de métricas");
    let client = match Client::new(config.client.to_options()) {
        Ok(client) => client,
        Err(e) => {
            error!("Falha ao criar client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let poller = &config.poller;
    let interval = Duration::from_secs_f64(poller.interval_secs);

    // ── Banner ──
    if !quiet {
        println!();
        println!("══════════════════════════════════════════════");
        println!("   🌡  DIGITEMP SENDER – ATIVO");
        println!("══════════════════════════════════════════════");
        println!("  Coletor:   {}:{}", client.resolver().host(), client.resolver().port());
        println!("  Sensores:  {}", poller.sensors.join(", "));
        println!("  Digitemp:  {}", sensors.configfile().display());
        println!("  Intervalo: {:.1}s", poller.interval_secs);
        println!("  Protocolo: v{}", metric_core::PROTOCOL_VERSION);
        println!("══════════════════════════════════════════════");
        println!();
    }

    // ── Loop principal ──
    loop {
        let cycle_start = Instant::now();

        match sensors.read_temperatures() {
            Ok(values) => {
                if values.len() != poller.sensors.len() {
                    warn!(
                        "{} valores lidos para {} sensores configurados",
                        values.len(),
                        poller.sensors.len()
                    );
                }
                send_temperatures(&client, &poller.sensors, &values);
            }
            Err(e) => {
                error!("Erro ao ler sensores: {e}");
                if once {
                    return ExitCode::FAILURE;
                }
            }
        }

        if once {
            debug!("Execução única concluída");
            return ExitCode::SUCCESS;
        }

        // Dormir pelo tempo restante do intervalo
        let elapsed = cycle_start.elapsed();
        if elapsed < interval {
            std::thread::sleep(interval - elapsed);
        } else {
            info!("Intervalo excedido ({:.1}s)", elapsed.as_secs_f64());
        }
    }
}
