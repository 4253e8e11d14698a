//! Resolução do endereço do coletor sem bloquear o `send`.
//!
//! - IPv4 literal: o pool é preenchido na hora, sem DNS.
//! - Nome + [`ResolveMode::Blocking`]: uma única resolução bloqueante durante
//!   a construção do Client.
//! - Nome + [`ResolveMode::Background`]: a resolução roda numa thread própria
//!   e o resultado chega por um channel. Cada `send` chama [`AddressResolver::poll`],
//!   que apenas drena o channel se já houver resposta.
//!
//! O pool só cresce. Não há expiração nem nova consulta após a primeira
//! resolução bem sucedida.

use crossbeam_channel::{Receiver, TryRecvError, bounded};
use rand::seq::SliceRandom;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::{Mutex, PoisonError, RwLock, TryLockError};
use tracing::{debug, info, warn};

/// Porta padrão do coletor ("MF" no teclado E.161).
pub const DEFAULT_PORT: u16 = 6333;

/// Host padrão do coletor.
pub const DEFAULT_HOST: &str = "udp-api.metricfire.com";

/// Erros de configuração do destino.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Especificação host:port inválida: {0}")]
    InvalidServer(String),
}

/// Estratégia de resolução para nomes (ignorada para IPv4 literal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Resolução bloqueante única, durante a construção.
    Blocking,
    /// Resolução em thread de background, drenada a cada `send`.
    Background,
}

type LookupResult = io::Result<Vec<SocketAddr>>;

/// Separa `host[:port]`. Sem porta, usa [`DEFAULT_PORT`].
pub fn parse_host_port(server: &str) -> Result<(String, u16), ResolverError> {
    let parts: Vec<&str> = server.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((host.to_string(), DEFAULT_PORT)),
        [host, port] if !host.is_empty() => port
            .parse::<u16>()
            .map(|port| (host.to_string(), port))
            .map_err(|_| ResolverError::InvalidServer(server.to_string())),
        _ => Err(ResolverError::InvalidServer(server.to_string())),
    }
}

/// Pool de endereços do coletor + consulta DNS pendente (no máximo uma).
#[derive(Debug)]
pub struct AddressResolver {
    host: String,
    port: u16,
    pool: RwLock<Vec<SocketAddr>>,
    pending: Mutex<Option<Receiver<LookupResult>>>,
}

impl AddressResolver {
    /// Classifica o host e dispara a resolução inicial.
    pub fn new(host: &str, port: u16, mode: ResolveMode) -> Self {
        let resolver = Self {
            host: host.to_string(),
            port,
            pool: RwLock::new(Vec::new()),
            pending: Mutex::new(None),
        };

        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            resolver.extend(vec![SocketAddr::from((ip, port))]);
            return resolver;
        }

        match mode {
            ResolveMode::Blocking => resolver.resolve_now(),
            ResolveMode::Background => match spawn_lookup(host, port) {
                Ok(rx) => {
                    *resolver.lock_pending() = Some(rx);
                    debug!("Resolução DNS de {host} iniciada em background");
                }
                Err(e) => {
                    warn!(
                        "Resolução DNS assíncrona indisponível ({e}). \
                         Usando resolução bloqueante para {host}"
                    );
                    resolver.resolve_now();
                }
            },
        }

        resolver
    }

    /// Pool fixo, sem resolução.
    pub fn from_addrs(port: u16, addrs: Vec<SocketAddr>) -> Self {
        Self {
            host: String::new(),
            port,
            pool: RwLock::new(addrs),
            pending: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Verifica, sem bloquear, se a consulta pendente já respondeu.
    ///
    /// Se outra thread estiver drenando a consulta, retorna imediatamente.
    pub fn poll(&self) {
        let mut pending = match self.pending.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };

        let Some(rx) = pending.as_ref() else {
            // Sem consulta pendente: o pool fica como está.
            return;
        };

        match rx.try_recv() {
            Ok(Ok(addrs)) => {
                info!("{} resolvido: {:?}", self.host, addrs);
                self.extend(addrs);
                *pending = None;
            }
            Ok(Err(e)) => {
                warn!("Falha ao resolver {}: {e}", self.host);
                *pending = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                warn!("Thread de resolução de {} terminou sem resposta", self.host);
                *pending = None;
            }
        }
    }

    /// Escolhe um endereço do pool ao acaso. `None` se o pool está vazio.
    pub fn pick_destination(&self) -> Option<SocketAddr> {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.choose(&mut rand::thread_rng()).copied()
    }

    /// Cópia do pool atual.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Há consulta DNS ainda não drenada?
    pub fn is_pending(&self) -> bool {
        self.lock_pending().is_some()
    }

    fn resolve_now(&self) {
        match lookup(&self.host, self.port) {
            Ok(addrs) => {
                info!("{} resolvido: {:?}", self.host, addrs);
                self.extend(addrs);
            }
            Err(e) => warn!("Falha ao resolver {}: {e}", self.host),
        }
    }

    fn extend(&self, addrs: Vec<SocketAddr>) {
        self.pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(addrs);
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<Receiver<LookupResult>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolução bloqueante. Mantém apenas IPv4: o socket de envio é AF_INET.
fn lookup(host: &str, port: u16) -> LookupResult {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()?
        .filter(SocketAddr::is_ipv4)
        .collect();
    Ok(addrs)
}

fn spawn_lookup(host: &str, port: u16) -> io::Result<Receiver<LookupResult>> {
    let (tx, rx) = bounded::<LookupResult>(1);
    let host = host.to_string();

    std::thread::Builder::new()
        .name("dns-resolver".into())
        .spawn(move || {
            // Se o Client já foi descartado, o resultado é abandonado.
            let _ = tx.send(lookup(&host, port));
        })?;

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[test]
    fn parses_host_with_and_without_port() {
        assert_eq!(
            parse_host_port("collector.local").unwrap(),
            ("collector.local".to_string(), DEFAULT_PORT)
        );
        assert_eq!(
            parse_host_port("10.0.0.1:9000").unwrap(),
            ("10.0.0.1".to_string(), 9000)
        );
    }

    #[test]
    fn rejects_malformed_server() {
        assert!(parse_host_port("a:b:c").is_err());
        assert!(parse_host_port("host:notaport").is_err());
        assert!(parse_host_port("host:70000").is_err());
        assert!(parse_host_port("").is_err());
        assert!(parse_host_port(":6333").is_err());
    }

    #[test]
    fn ipv4_literal_is_available_immediately() {
        let resolver = AddressResolver::new("127.0.0.1", 6333, ResolveMode::Background);
        assert!(!resolver.is_pending());
        assert_eq!(
            resolver.pick_destination(),
            Some("127.0.0.1:6333".parse().unwrap())
        );
    }

    #[test]
    fn blocking_mode_resolves_during_construction() {
        let resolver = AddressResolver::new("localhost", 7000, ResolveMode::Blocking);
        assert!(!resolver.is_pending());
        let addrs = resolver.addresses();
        assert!(!addrs.is_empty());
        assert!(addrs.iter().all(|a| a.is_ipv4() && a.port() == 7000));
    }

    #[test]
    fn background_mode_fills_pool_after_poll() {
        let resolver = AddressResolver::new("localhost", 7001, ResolveMode::Background);

        let deadline = Instant::now() + Duration::from_secs(5);
        while resolver.is_pending() && Instant::now() < deadline {
            resolver.poll();
            std::thread::sleep(Duration::from_millis(10));
        }

        assert!(!resolver.is_pending());
        assert!(resolver.pick_destination().is_some());
    }

    #[test]
    fn empty_pool_has_no_destination() {
        let resolver = AddressResolver::from_addrs(6333, Vec::new());
        resolver.poll();
        assert_eq!(resolver.pick_destination(), None);
    }

    #[test]
    fn pick_destination_reaches_every_member() {
        let addrs: Vec<SocketAddr> = vec![
            "10.0.0.1:6333".parse().unwrap(),
            "10.0.0.2:6333".parse().unwrap(),
            "10.0.0.3:6333".parse().unwrap(),
        ];
        let resolver = AddressResolver::from_addrs(6333, addrs.clone());

        let picked: HashSet<SocketAddr> = (0..300)
            .filter_map(|_| resolver.pick_destination())
            .collect();
        assert_eq!(picked, addrs.into_iter().collect());
    }
}
