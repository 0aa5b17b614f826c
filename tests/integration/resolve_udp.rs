//! End-to-end tests: a real `Session` over UDP against an in-process server
//! that speaks the response frame format.

use ip2loc_client::Session;
use ip2loc_domain::{ClientConfig, LookupError};
use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

struct ServerOptions {
    password: &'static str,
    /// Swallow the first request for each of these addresses.
    drop_first_for: &'static [&'static str],
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            password: "secret",
            drop_first_for: &[],
        }
    }
}

struct ParsedRequest {
    password: String,
    challenge_hex: String,
    ip_addr: String,
}

fn parse_request(raw: &[u8]) -> Option<ParsedRequest> {
    let text = std::str::from_utf8(raw).ok()?;
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() != 5 || lines[0] != "ip2locRequest" || !lines[4].is_empty() {
        return None;
    }
    let challenge_hex = lines[2].strip_prefix("getLocationForIP:")?;
    Some(ParsedRequest {
        password: lines[1].to_string(),
        challenge_hex: challenge_hex.to_string(),
        ip_addr: lines[3].to_string(),
    })
}

/// Bind a lookup server on an ephemeral port and serve until dropped.
async fn spawn_server(options: ServerOptions) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut dropped: HashSet<String> = HashSet::new();
        let mut buf = [0u8; 512];
        loop {
            let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Some(request) = parse_request(&buf[..len]) else {
                continue;
            };
            if request.password != options.password {
                continue;
            }
            if options.drop_first_for.contains(&request.ip_addr.as_str())
                && dropped.insert(request.ip_addr.clone())
            {
                continue;
            }
            let response = format!(
                "ip2locResponse\ngetLocationForIP:{}\n{}\n\nUS\nUNITED STATES\n\
                 CALIFORNIA\nSAN FRANCISCO\n37.7749\n-122.4194\n",
                request.challenge_hex, request.ip_addr
            );
            let _ = socket.send_to(response.as_bytes(), peer).await;
        }
    });
    addr
}

fn config_for(addr: SocketAddr, timeout_ms: f64, retries: u32) -> ClientConfig {
    let mut config = ClientConfig::new("secret");
    config.host = addr.ip().to_string();
    config.port = addr.port();
    config.timeout_ms = timeout_ms;
    config.retries = retries;
    config
}

#[tokio::test]
async fn test_batch_resolves_against_live_server() {
    let addr = spawn_server(ServerOptions::default()).await;
    let mut session = Session::connect(config_for(addr, 500.0, 2)).await.unwrap();

    let batch = ["8.8.8.8", "99.50.206.241", "1.1.1.1"];
    let outcome = session.resolve(&batch).await.unwrap();

    assert!(outcome.fully_resolved());
    for ip_addr in batch {
        let location = outcome.location(ip_addr).unwrap();
        assert_eq!(location.ip_addr, ip_addr);
        assert_eq!(location.country_code, "US");
        assert_eq!(location.city, "SAN FRANCISCO");
        assert_eq!(location.latitude, 37.7749);
        assert_eq!(location.longitude, -122.4194);
    }
    session.close();
}

#[tokio::test]
async fn test_dropped_response_is_recovered_on_retry() {
    let addr = spawn_server(ServerOptions {
        drop_first_for: &["2.2.2.2"],
        ..Default::default()
    })
    .await;
    let mut session = Session::connect(config_for(addr, 150.0, 2)).await.unwrap();

    let outcome = session.resolve(&["1.1.1.1", "2.2.2.2"]).await.unwrap();

    assert!(outcome.fully_resolved());
    assert_eq!(outcome.location("2.2.2.2").unwrap().ip_addr, "2.2.2.2");
    session.close();
}

#[tokio::test]
async fn test_wrong_password_times_out() {
    let addr = spawn_server(ServerOptions {
        password: "other-password",
        ..Default::default()
    })
    .await;
    let mut session = Session::connect(config_for(addr, 100.0, 0)).await.unwrap();

    let outcome = session.resolve(&["3.3.3.3"]).await.unwrap();

    assert!(matches!(outcome.error("3.3.3.3"), Some(LookupError::Timeout)));
    session.close();
}

#[tokio::test]
async fn test_mixed_batch_against_live_server() {
    let addr = spawn_server(ServerOptions::default()).await;
    let mut session = Session::connect(config_for(addr, 300.0, 1)).await.unwrap();

    let outcome = session
        .resolve(&["8.8.4.4", "definitely-not-an-ip"])
        .await
        .unwrap();

    assert_eq!(outcome.resolved_count(), 1);
    assert!(matches!(
        outcome.error("definitely-not-an-ip"),
        Some(LookupError::InvalidFormat)
    ));
    session.close();
}
