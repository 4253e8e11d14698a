//! Client de métricas: identidade, sessão, resolução e socket UDP.
//!
//! [`Client::send`] nunca bloqueia em rede e nunca retorna erro. Cada chamada
//! vira no máximo um datagrama. Sem destino disponível, a mensagem é
//! descartada (entrega best-effort, sem buffer nem retry).

use crate::identity::Identity;
use crate::instrument::MetricSink;
use crate::key::{AuthKey, KeyError, parse_credential};
use crate::protocol::{MAX_UDP_PAYLOAD, Measurement, encode_message};
use crate::resolver::{
    AddressResolver, DEFAULT_HOST, DEFAULT_PORT, ResolveMode, ResolverError, parse_host_port,
};
use crate::session::SessionState;
use std::io;
use std::net::UdpSocket;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Erros de construção do Client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidCredential(#[from] KeyError),

    #[error(transparent)]
    InvalidServer(#[from] ResolverError),

    #[error("Falha ao criar socket UDP: {0}")]
    Socket(#[from] io::Error),

    #[error("Client global já inicializado")]
    AlreadyInitialized,
}

/// Parâmetros de construção do [`Client`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Chave secreta (UUID/hex ou base64).
    pub key: String,
    /// Nome da aplicação. `None` ou vazio = `argv[0]`.
    pub application: Option<String>,
    /// `host[:port]` do coletor. `None` = coletor padrão.
    pub server: Option<String>,
    /// Assina cada mensagem com HMAC-SHA256.
    pub authentication: bool,
    /// Esquema de criptografia do body. Não implementado: o body segue em texto puro.
    pub encryption: Option<String>,
    /// Resolve o coletor em background em vez de bloquear na construção.
    pub async_resolve: bool,
}

impl ClientOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            application: None,
            server: None,
            authentication: true,
            encryption: None,
            async_resolve: true,
        }
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn authentication(mut self, enabled: bool) -> Self {
        self.authentication = enabled;
        self
    }

    pub fn async_resolve(mut self, enabled: bool) -> Self {
        self.async_resolve = enabled;
        self
    }
}

/// Client de métricas. Pode ser compartilhado entre threads (`Arc<Client>`).
#[derive(Debug)]
pub struct Client {
    key: AuthKey,
    identity: Identity,
    authentication: bool,
    session: SessionState,
    resolver: AddressResolver,
    socket: UdpSocket,
}

impl Client {
    /// Cria o Client. Falha apenas com chave, servidor ou socket inválidos.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let key = parse_credential(&options.key)?;

        let (host, port) = match options.server.as_deref().filter(|s| !s.is_empty()) {
            Some(server) => parse_host_port(server)?,
            None => (DEFAULT_HOST.to_string(), DEFAULT_PORT),
        };
        let mode = if options.async_resolve {
            ResolveMode::Background
        } else {
            ResolveMode::Blocking
        };
        let resolver = AddressResolver::new(&host, port, mode);

        Self::assemble(key, &options, resolver)
    }

    fn assemble(
        key: AuthKey,
        options: &ClientOptions,
        resolver: AddressResolver,
    ) -> Result<Self, ClientError> {
        if let Some(scheme) = &options.encryption {
            warn!("Criptografia \"{scheme}\" não implementada. O body será enviado em texto puro");
        }

        let identity = Identity::resolve(&key, options.application.as_deref());

        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;

        Ok(Self {
            key,
            identity,
            authentication: options.authentication,
            session: SessionState::new(),
            resolver,
            socket,
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Envia uma métrica sem bloquear.
    ///
    /// Sem `timestamp`, usa o instante atual (segundos UNIX).
    pub fn send(&self, metric: &str, value: f64, timestamp: Option<f64>) {
        let timestamp = timestamp.unwrap_or_else(unix_now);
        self.dispatch(&[Measurement::new(metric, value, Some(timestamp))]);
    }

    fn dispatch(&self, measurements: &[Measurement]) {
        // A sequência avança mesmo quando a mensagem acaba descartada.
        let envelope = self.session.next_envelope();
        self.resolver.poll();

        let key = self.authentication.then_some(&self.key);
        let frame = match encode_message(&self.identity, &envelope, measurements, key) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Erro ao serializar mensagem: {e}");
                return;
            }
        };
        if frame.len() > MAX_UDP_PAYLOAD {
            warn!("Mensagem de {} bytes excede o limite UDP, descartada", frame.len());
            return;
        }

        let Some(dest) = self.resolver.pick_destination() else {
            debug!("Sem destino resolvido, mensagem q={} descartada", envelope.sequence);
            return;
        };

        match self.socket.send_to(&frame, dest) {
            Ok(sent) => debug!("→ {sent} bytes para {dest} (q={})", envelope.sequence),
            Err(e) => debug!("Erro ao enviar UDP para {dest}: {e}"),
        }
    }

    #[cfg(test)]
    fn with_resolver(options: ClientOptions, resolver: AddressResolver) -> Result<Self, ClientError> {
        let key = parse_credential(&options.key)?;
        Self::assemble(key, &options, resolver)
    }
}

impl MetricSink for Client {
    fn send(&self, metric: &str, value: f64, timestamp: Option<f64>) {
        Client::send(self, metric, value, timestamp);
    }
}

/// Instante atual em segundos UNIX.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_message, verify_auth};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    const KEY: &str = "01020304-0506-0708-090a-0b0c0d0e0f10";

    fn collector() -> (UdpSocket, String) {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let addr = sock.local_addr().unwrap().to_string();
        (sock, addr)
    }

    fn receive(sock: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 65536];
        let (size, _) = sock.recv_from(&mut buf).unwrap();
        buf[..size].to_vec()
    }

    #[test]
    fn rejects_invalid_credential() {
        let result = Client::new(ClientOptions::new("definitely-not-a-key").server("127.0.0.1"));
        assert!(matches!(result, Err(ClientError::InvalidCredential(_))));
    }

    #[test]
    fn rejects_invalid_server() {
        let result = Client::new(ClientOptions::new(KEY).server("a:b:c"));
        assert!(matches!(result, Err(ClientError::InvalidServer(_))));
    }

    #[test]
    fn sends_one_authenticated_datagram() {
        let (sock, addr) = collector();
        let client = Client::new(ClientOptions::new(KEY).application("weather-station").server(&addr)).unwrap();

        let before = unix_now();
        client.send("outside", 21.5, None);
        let msg = decode_message(&receive(&sock)).unwrap();

        let key = parse_credential(KEY).unwrap();
        assert_eq!(msg.header.f, key.fingerprint());
        assert_eq!(msg.header.q, 1);
        assert!(verify_auth(&key, &msg));
        assert_eq!(msg.body.a, "weather-station");

        let m = &msg.body.m[0];
        assert_eq!(m.metric(), "outside");
        assert_eq!(m.value(), 21.5);
        let ts = m.timestamp().unwrap();
        assert!((ts - before).abs() < 1.0);
    }

    #[test]
    fn explicit_timestamp_is_kept() {
        let (sock, addr) = collector();
        let client = Client::new(ClientOptions::new(KEY).server(&addr)).unwrap();

        client.send("inside", 19.0, Some(1_600_000_000.0));
        let msg = decode_message(&receive(&sock)).unwrap();
        assert_eq!(msg.body.m[0].timestamp(), Some(1_600_000_000.0));
    }

    #[test]
    fn non_finite_value_is_dropped() {
        let (sock, addr) = collector();
        let client = Client::new(ClientOptions::new(KEY).server(&addr)).unwrap();

        client.send("outside", f64::NAN, None);
        client.send("outside", f64::INFINITY, None);
        client.send("outside", 4.5, None);

        // Só o valor finito chega; os descartados consumiram q=1 e q=2.
        let msg = decode_message(&receive(&sock)).unwrap();
        assert_eq!(msg.header.q, 3);
        assert_eq!(msg.body.m[0].value(), 4.5);
    }

    #[test]
    fn unauthenticated_messages_have_no_tag() {
        let (sock, addr) = collector();
        let client =
            Client::new(ClientOptions::new(KEY).server(&addr).authentication(false)).unwrap();

        client.send("outside", 1.0, None);
        let msg = decode_message(&receive(&sock)).unwrap();
        assert!(msg.header.a.is_none());
    }

    #[test]
    fn sequence_increases_across_sends() {
        let (sock, addr) = collector();
        let client = Client::new(ClientOptions::new(KEY).server(&addr)).unwrap();

        for _ in 0..3 {
            client.send("outside", 1.0, None);
        }
        let seqs: Vec<u32> = (0..3)
            .map(|_| decode_message(&receive(&sock)).unwrap().header.q)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn empty_pool_drops_without_blocking() {
        let resolver = AddressResolver::from_addrs(DEFAULT_PORT, Vec::new());
        let client = Client::with_resolver(ClientOptions::new(KEY), resolver).unwrap();

        let start = Instant::now();
        client.send("outside", 1.0, None);
        client.send("outside", 2.0, None);
        assert!(start.elapsed() < Duration::from_secs(1));

        // Mensagens descartadas também consomem sequência.
        assert_eq!(client.session.next_envelope().sequence, 3);
    }

    #[test]
    fn concurrent_senders_get_unique_sequences() {
        let (sock, addr) = collector();
        let client = Arc::new(Client::new(ClientOptions::new(KEY).server(&addr)).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let client = Arc::clone(&client);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        client.send("load", i as f64, None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seqs: HashSet<u32> = (0..40)
            .map(|_| decode_message(&receive(&sock)).unwrap().header.q)
            .collect();
        assert_eq!(seqs, (1..=40).collect());
    }
}
