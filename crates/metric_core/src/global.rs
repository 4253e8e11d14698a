//! Client global do processo (API de conveniência).
//!
//! Camada opcional sobre [`Client`]: quem preferir pode criar o próprio
//! Client e passá-lo adiante. Aqui o Client é inicializado uma única vez e
//! usado via funções livres.

use crate::client::{Client, ClientError, ClientOptions};
use crate::instrument::MetricSink;
use std::sync::OnceLock;
use tracing::warn;

static CLIENT: OnceLock<Client> = OnceLock::new();

/// Inicializa o client global. Uma segunda chamada falha com
/// [`ClientError::AlreadyInitialized`].
pub fn init(options: ClientOptions) -> Result<&'static Client, ClientError> {
    if CLIENT.get().is_some() {
        return Err(ClientError::AlreadyInitialized);
    }
    let client = Client::new(options)?;
    CLIENT
        .set(client)
        .map_err(|_| ClientError::AlreadyInitialized)?;
    CLIENT.get().ok_or(ClientError::AlreadyInitialized)
}

/// Client global, se já inicializado.
pub fn client() -> Option<&'static Client> {
    CLIENT.get()
}

/// Envia pelo client global. Antes de [`init`], a métrica é descartada com
/// um aviso.
pub fn send(metric: &str, value: f64, timestamp: Option<f64>) {
    match CLIENT.get() {
        Some(client) => client.send(metric, value, timestamp),
        None => warn!(
            "send() chamado antes de init(). Chame init() ou use um Client. \
             Métrica \"{metric}\" descartada"
        ),
    }
}

/// [`MetricSink`] que encaminha para o client global.
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

impl MetricSink for Global {
    fn send(&self, metric: &str, value: f64, timestamp: Option<f64>) {
        send(metric, value, timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Timer;

    // Os testes unitários nunca chamam init(): o caminho inicializado fica
    // em tests/global.rs, que roda em processo próprio.

    #[test]
    fn send_before_init_is_dropped() {
        assert!(client().is_none());
        send("outside", 21.5, None);
    }

    #[test]
    fn timer_on_global_sink_does_not_panic_uninitialized() {
        let mut timer = Timer::new(&Global, Some("app"));
        timer.start("poll");
        timer.stop();
        assert!(!timer.is_running());
    }
}
