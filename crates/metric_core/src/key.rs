//! Parsing da chave secreta da aplicação.
//!
//! Dois formatos são aceitos:
//!
//! - UUID / hex: 32 dígitos hexadecimais, hífens opcionais → 16 bytes
//! - Base64 padrão que decodifica para exatamente 32 bytes → 32 bytes
//!
//! A chave bruta nunca é transmitida. Ela serve apenas como chave do HMAC e
//! para derivar o fingerprint público enviado em cada header.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};

/// Tamanho da chave no formato UUID/hex.
pub const UUID_KEY_LEN: usize = 16;

/// Tamanho da chave no formato base64.
pub const BASE64_KEY_LEN: usize = 32;

/// Erros de parsing da chave.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("Chave inválida (nem UUID nem Base64 de {BASE64_KEY_LEN} bytes): {0}")]
    InvalidCredential(String),
}

/// Chave de autenticação bruta (16 ou 32 bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(Vec<u8>);

impl AuthKey {
    /// Bytes brutos da chave.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Fingerprint público: MD5 da chave bruta em hex minúsculo.
    pub fn fingerprint(&self) -> String {
        hex::encode(Md5::digest(&self.0))
    }
}

// A chave é segredo: nunca aparece em logs.
impl std::fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthKey({} bytes, {})", self.0.len(), self.fingerprint())
    }
}

/// Converte a credencial fornecida pelo usuário nos bytes da chave.
///
/// Tenta primeiro hex (hífens removidos, 16 bytes); depois base64 (32 bytes).
pub fn parse_credential(input: &str) -> Result<AuthKey, KeyError> {
    let compact = input.replace('-', "");
    if let Ok(raw) = hex::decode(&compact) {
        if raw.len() == UUID_KEY_LEN {
            return Ok(AuthKey(raw));
        }
    }

    if let Ok(raw) = STANDARD.decode(input.trim()) {
        if raw.len() == BASE64_KEY_LEN {
            return Ok(AuthKey(raw));
        }
    }

    Err(KeyError::InvalidCredential(input.to_string()))
}
