//! Estado de sessão: chave de sessão aleatória + número de sequência.
//!
//! Cada mensagem enviada captura um par (session key, sequência) que nunca se
//! repete durante a vida do processo. Isso limita o valor de replay de uma
//! mensagem capturada. A chave é rotacionada na primeira chamada e sempre que
//! a sequência esgotaria os 32 bits.

use rand::RngCore;
use rand::rngs::OsRng;
use std::sync::{Mutex, PoisonError};

/// Tamanho da chave de sessão em bytes.
pub const SESSION_KEY_LEN: usize = 16;

/// Chave de sessão aleatória.
pub type SessionKey = [u8; SESSION_KEY_LEN];

/// Par capturado por uma mensagem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub session_key: SessionKey,
    /// Sempre ≥ 1.
    pub sequence: u32,
}

impl Envelope {
    /// Chave de sessão em hex minúsculo (campo `s` do header).
    pub fn session_key_hex(&self) -> String {
        hex::encode(self.session_key)
    }
}

#[derive(Debug, Default)]
struct Inner {
    session_key: Option<SessionKey>,
    sequence: u32,
}

/// Estado compartilhado entre todas as threads que enviam por um Client.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Avança a sequência (rotacionando a chave se necessário) e devolve o
    /// par a ser usado pela próxima mensagem.
    ///
    /// A seção crítica não faz I/O: apenas incremento e, na rotação, leitura
    /// de 16 bytes do gerador do sistema operacional.
    pub fn next_envelope(&self) -> Envelope {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let next = inner.sequence.checked_add(1);
        match (inner.session_key, next) {
            (Some(key), Some(sequence)) => {
                inner.sequence = sequence;
                Envelope {
                    session_key: key,
                    sequence,
                }
            }
            _ => {
                let key = generate_session_key();
                inner.session_key = Some(key);
                inner.sequence = 1;
                Envelope {
                    session_key: key,
                    sequence: 1,
                }
            }
        }
    }

    #[cfg(test)]
    fn with_position(session_key: SessionKey, sequence: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                session_key: Some(session_key),
                sequence,
            }),
        }
    }
}

fn generate_session_key() -> SessionKey {
    let mut key = [0u8; SESSION_KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}
