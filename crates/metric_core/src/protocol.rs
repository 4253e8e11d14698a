//! Protocolo de comunicação textual.
//!
//! Uma mensagem = um datagrama UDP, em duas partes JSON separadas por `\n`:
//!
//! ```text
//! ┌──────────────────────────────┬────┬──────────────────────────────┐
//! │ Header {v, f, s, q, a?}      │ \n │ Body {h, a, m: [[n, v, t]]}  │
//! └──────────────────────────────┴────┴──────────────────────────────┘
//! ```
//!
//! - `v`: versão do protocolo
//! - `f`: fingerprint (MD5 hex) da chave
//! - `s`: chave de sessão em hex, `q`: número de sequência
//! - `a`: HMAC-SHA256(chave, session key ‖ decimal(q) ‖ body), só com autenticação
//!
//! O body vai em texto puro. Criptografia do body não existe no protocolo.

use crate::identity::Identity;
use crate::key::AuthKey;
use crate::session::{Envelope, SESSION_KEY_LEN};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Versão atual do protocolo.
pub const PROTOCOL_VERSION: u32 = 2;

/// Separador entre header e body.
pub const SEPARATOR: u8 = b'\n';

/// Tamanho máximo de pacote UDP seguro (sem fragmentação).
pub const MAX_UDP_PAYLOAD: usize = 65507;

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Erro de deserialização: {0}")]
    Deserialize(String),

    #[error("Mensagem sem separador entre header e body")]
    MissingSeparator,

    #[error("Versão incompatível: {0} (suportada: {PROTOCOL_VERSION})")]
    VersionMismatch(u32),

    #[error("Valor não finito na métrica {0:?}")]
    NonFiniteValue(String),
}

/// Uma medição: nome, valor e timestamp UNIX opcional (segundos).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement(pub String, pub f64, pub Option<f64>);

impl Measurement {
    pub fn new(metric: impl Into<String>, value: f64, timestamp: Option<f64>) -> Self {
        Self(metric.into(), value, timestamp)
    }

    pub fn metric(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> f64 {
        self.1
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.2
    }
}

/// Header da mensagem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub v: u32,
    pub f: String,
    pub s: String,
    pub q: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub a: Option<String>,
}

/// Body da mensagem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub h: String,
    pub a: String,
    pub m: Vec<Measurement>,
}

/// Mensagem decodificada, com os bytes do body preservados para verificação.
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub header: Header,
    pub body: Body,
    pub body_bytes: Vec<u8>,
}

/// Monta a mensagem completa (`header\nbody`) para um lote de medições.
///
/// Com `key` presente a mensagem é autenticada (campo `a` no header).
/// Valores ou timestamps NaN/infinitos são recusados: JSON não os representa.
pub fn encode_message(
    identity: &Identity,
    envelope: &Envelope,
    measurements: &[Measurement],
    key: Option<&AuthKey>,
) -> Result<Vec<u8>, ProtocolError> {
    if let Some(bad) = measurements
        .iter()
        .find(|m| !m.1.is_finite() || m.2.is_some_and(|t| !t.is_finite()))
    {
        return Err(ProtocolError::NonFiniteValue(bad.0.clone()));
    }

    let body = Body {
        h: identity.hostname.clone(),
        a: identity.application.clone(),
        m: measurements.to_vec(),
    };
    let body_bytes =
        serde_json::to_vec(&body).map_err(|e| ProtocolError::Serialize(e.to_string()))?;

    let header = Header {
        v: PROTOCOL_VERSION,
        f: identity.key_fingerprint.clone(),
        s: envelope.session_key_hex(),
        q: envelope.sequence,
        a: key.map(|k| auth_tag(k, &envelope.session_key, envelope.sequence, &body_bytes)),
    };
    let header_bytes =
        serde_json::to_vec(&header).map_err(|e| ProtocolError::Serialize(e.to_string()))?;

    let mut frame = Vec::with_capacity(header_bytes.len() + 1 + body_bytes.len());
    frame.extend_from_slice(&header_bytes);
    frame.push(SEPARATOR);
    frame.extend_from_slice(&body_bytes);

    Ok(frame)
}

/// Decodifica um datagrama recebido. Não verifica a autenticação.
pub fn decode_message(data: &[u8]) -> Result<WireMessage, ProtocolError> {
    let split = data
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or(ProtocolError::MissingSeparator)?;
    let (header_bytes, rest) = data.split_at(split);
    let body_bytes = &rest[1..];

    let header: Header = serde_json::from_slice(header_bytes)
        .map_err(|e| ProtocolError::Deserialize(e.to_string()))?;
    if header.v != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(header.v));
    }

    let body: Body = serde_json::from_slice(body_bytes)
        .map_err(|e| ProtocolError::Deserialize(e.to_string()))?;

    Ok(WireMessage {
        header,
        body,
        body_bytes: body_bytes.to_vec(),
    })
}

/// Calcula a tag HMAC-SHA256 em hex minúsculo.
pub fn auth_tag(key: &AuthKey, session_key: &[u8], sequence: u32, body: &[u8]) -> String {
    hex::encode(tag_mac(key, session_key, sequence, body).finalize().into_bytes())
}

/// Confere a tag do header contra a chave. `false` se ausente ou malformada.
pub fn verify_auth(key: &AuthKey, message: &WireMessage) -> bool {
    let Some(tag) = message.header.a.as_deref().and_then(|t| hex::decode(t).ok()) else {
        return false;
    };
    let Ok(session_key) = hex::decode(&message.header.s) else {
        return false;
    };
    if session_key.len() != SESSION_KEY_LEN {
        return false;
    }

    tag_mac(key, &session_key, message.header.q, &message.body_bytes)
        .verify_slice(&tag)
        .is_ok()
}

fn tag_mac(key: &AuthKey, session_key: &[u8], sequence: u32, body: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC aceita chaves de qualquer tamanho"));
    mac.update(session_key);
    mac.update(sequence.to_string().as_bytes());
    mac.update(body);
    mac
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
