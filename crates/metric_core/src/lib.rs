//! # Metric Core
//!
//! Client leve e não bloqueante de métricas: autentica, serializa e envia
//! medições nomeadas para um coletor remoto via UDP, sem garantia de entrega.
//!
//! ## Módulos
//! - [`key`] – Parsing da chave (UUID/hex ou base64) e fingerprint
//! - [`session`] – Chave de sessão + sequência com rotação
//! - [`resolver`] – Pool de endereços do coletor, DNS sem bloquear o `send`
//! - [`protocol`] – Mensagem `header\nbody` em JSON com tag HMAC-SHA256
//! - [`identity`] – Fingerprint, aplicação e hostname
//! - [`client`] – Orquestra tudo e expõe `send`
//! - [`global`] – Client global opcional (`init` + `send`)
//! - [`instrument`] – `Timer` e `measure`
//! - [`config`] – Configuração unificada via TOML

pub mod key;
pub mod session;
pub mod resolver;
pub mod protocol;
pub mod identity;
pub mod client;
pub mod global;
pub mod instrument;
pub mod config;

// Re-exports convenientes
pub use client::{Client, ClientError, ClientOptions};
pub use global::{init, send};
pub use instrument::{MetricSink, Timer, measure};
pub use protocol::{Measurement, PROTOCOL_VERSION, decode_message, encode_message, verify_auth};
pub use config::{AppConfig, ClientConfig, PollerConfig};
