//! Cenário ponta a ponta: Client → UDP loopback → coletor falso.

use metric_core::key::parse_credential;
use metric_core::{Client, ClientOptions, Timer, decode_message, verify_auth};
use std::net::UdpSocket;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const KEY: &str = "01020304-0506-0708-090a-0b0c0d0e0f10";

fn collector() -> UdpSocket {
    let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    sock
}

fn receive(sock: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 65536];
    let (size, _) = sock.recv_from(&mut buf).unwrap();
    buf[..size].to_vec()
}

#[test]
fn sends_one_signed_datagram() {
    let sock = collector();
    let server = sock.local_addr().unwrap().to_string();
    let client = Client::new(ClientOptions::new(KEY).application("weather-station").server(server)).unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs_f64();
    client.send("outside", 21.5, None);

    let msg = decode_message(&receive(&sock)).unwrap();
    let key = parse_credential(KEY).unwrap();

    assert_eq!(msg.header.f, key.fingerprint());
    assert_eq!(msg.header.q, 1);
    assert!(verify_auth(&key, &msg));

    assert_eq!(msg.body.m.len(), 1);
    let m = &msg.body.m[0];
    assert_eq!((m.metric(), m.value()), ("outside", 21.5));
    assert!((m.timestamp().unwrap() - now).abs() < 1.0);

    // Exatamente um datagrama.
    sock.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut buf = [0u8; 1024];
    assert!(sock.recv_from(&mut buf).is_err());
}

#[test]
fn timer_reports_through_client() {
    let sock = collector();
    let server = sock.local_addr().unwrap().to_string();
    let client = Client::new(ClientOptions::new(KEY).server(server)).unwrap();

    {
        let _timer = Timer::scoped(&client, Some("cycle"));
        std::thread::sleep(Duration::from_millis(20));
    }

    let msg = decode_message(&receive(&sock)).unwrap();
    let m = &msg.body.m[0];
    assert_eq!(m.metric(), "cycle");
    assert!(m.value() >= 0.015);
}
