use sockfwd_core::TransportKind;
use sockfwd_fabric::{
    error::Error,
    listen,
    transport::{Acceptor, TcpTransportListener, UnixTransportListener},
    Endpoint, Target,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Helper to get a bound listener on a free port
async fn get_listener() -> (TcpTransportListener, std::net::SocketAddr) {
    let listener = TcpTransportListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn tcp_dial_and_accept_carry_bytes() {
    let (listener, addr) = get_listener().await;

    // Spawn server that echoes one chunk
    tokio::spawn(async move {
        let (mut conn, peer) = listener.accept().await.unwrap();
        assert!(matches!(peer, Endpoint::Tcp(_)));
        let mut buf = [0u8; 5];
        conn.read_exact(&mut buf).await.unwrap();
        conn.write_all(&buf).await.unwrap();
    });

    let target = Target::new(TransportKind::Tcp, addr.to_string());
    let mut client = target.dial().await.unwrap();
    client.write_all(b"hello").await.unwrap();

    let mut response = [0u8; 5];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(&response, b"hello");
}

#[tokio::test]
async fn tcp_listen_accepts_bare_port() {
    let acceptor = listen(TransportKind::Tcp, ":0").await.unwrap();
    let addr = acceptor.local_endpoint().unwrap().socket_addr().unwrap();
    assert_ne!(addr.port(), 0);

    // ":port" dials loopback
    let target = Target::new(TransportKind::Tcp, format!(":{}", addr.port()));
    let accepted = tokio::spawn(async move { acceptor.accept().await.map(|_| ()) });
    target.dial().await.unwrap();
    accepted.await.unwrap().unwrap();
}

#[tokio::test]
async fn tcp_duplicate_bind_is_address_in_use() {
    let (_listener, addr) = get_listener().await;

    let result = listen(TransportKind::Tcp, &addr.to_string()).await;
    match result {
        Err(Error::AddressInUse(address)) => assert_eq!(address, addr.to_string()),
        Err(e) => panic!("Expected AddressInUse, got {:?}", e),
        Ok(_) => panic!("Expected AddressInUse, bind succeeded"),
    }
}

#[tokio::test]
async fn tcp_dial_refused_is_not_retried() {
    // Reserve a port, then free it so nothing listens there
    let addr = {
        let (_listener, addr) = get_listener().await;
        addr
    };

    let target = Target::new(TransportKind::Tcp, addr.to_string())
        .connect_timeout(Duration::from_secs(2));
    let result = target.dial().await;
    match result {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
        Err(e) => panic!("Expected connection refused, got {:?}", e),
        Ok(_) => panic!("Expected connection refused, dial succeeded"),
    }
}

#[tokio::test]
async fn unknown_transport_fails_before_io() {
    let result = Target::parse("bogus", "127.0.0.1:1");
    match result {
        Err(Error::Core(sockfwd_core::Error::UnsupportedTransport(kind))) => {
            assert_eq!(kind, "bogus")
        }
        other => panic!("Expected UnsupportedTransport, got {:?}", other),
    }
}

#[tokio::test]
async fn listen_on_abstract_is_unsupported() {
    let result = listen(TransportKind::Abstract, "webview").await;
    assert!(matches!(
        result,
        Err(Error::Core(sockfwd_core::Error::UnsupportedTransport(_)))
    ));
}

// Unix Socket Tests

#[tokio::test]
async fn unix_dial_and_accept_carry_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("echo.sock");

    let acceptor = listen(TransportKind::Unix, socket_path.to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(
        acceptor.local_endpoint().unwrap(),
        Endpoint::Unix(Some(socket_path.clone()))
    );

    // Spawn server
    tokio::spawn(async move {
        let (mut conn, _peer) = acceptor.accept().await.unwrap();
        let mut buf = [0u8; 10];
        conn.read_exact(&mut buf).await.unwrap();
        conn.write_all(&buf).await.unwrap();
    });

    let target = Target::new(TransportKind::Unix, socket_path.to_str().unwrap());
    let mut client = target.dial().await.unwrap();
    client.write_all(b"hello unix").await.unwrap();

    let mut response = [0u8; 10];
    client.read_exact(&mut response).await.unwrap();
    assert_eq!(&response, b"hello unix");
}

#[tokio::test]
async fn unix_listener_replaces_stale_file() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("stale.sock");

    // Leftover from a crashed instance
    std::fs::write(&socket_path, b"not a socket").unwrap();

    let listener = UnixTransportListener::bind(&socket_path).await.unwrap();
    assert_eq!(listener.path(), socket_path.as_path());

    let target = Target::new(TransportKind::Unix, socket_path.to_str().unwrap());
    let accepted = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
    target.dial().await.unwrap();
    accepted.await.unwrap().unwrap();
}

#[tokio::test]
async fn unix_listener_cleans_up_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("cleanup.sock");

    {
        let _listener = UnixTransportListener::bind(&socket_path).await.unwrap();
        assert!(socket_path.exists());
    }

    // Socket should be cleaned up
    assert!(!socket_path.exists());
}

#[tokio::test]
async fn unix_dial_missing_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("missing.sock");

    let target = Target::new(TransportKind::Unix, socket_path.to_str().unwrap());
    match target.dial().await {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        Err(e) => panic!("Expected NotFound, got {:?}", e),
        Ok(_) => panic!("Expected NotFound, dial succeeded"),
    }
}

// Abstract Namespace Tests

#[cfg(target_os = "linux")]
fn bind_abstract(name: &str) -> tokio::net::UnixListener {
    use std::os::linux::net::SocketAddrExt;

    let addr = std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes()).unwrap();
    let listener = std::os::unix::net::UnixListener::bind_addr(&addr).unwrap();
    listener.set_nonblocking(true).unwrap();
    tokio::net::UnixListener::from_std(listener).unwrap()
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn abstract_bare_and_prefixed_names_reach_same_socket() {
    let name = format!("sockfwd-fabric-test-{}", std::process::id());
    let listener = bind_abstract(&name);

    // Server tags each connection with its accept order
    tokio::spawn(async move {
        for tag in [b'1', b'2'] {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(&[tag]).await.unwrap();
        }
    });

    for (dialed, expected) in [(name.clone(), b'1'), (format!("@{}", name), b'2')] {
        let mut conn = Target::new(TransportKind::Abstract, dialed)
            .dial()
            .await
            .unwrap();
        let mut buf = [0u8; 1];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf[0], expected);
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn abstract_dial_without_listener_is_refused() {
    let name = format!("sockfwd-fabric-absent-{}", std::process::id());
    let target = Target::new(TransportKind::Abstract, name);
    match target.dial().await {
        Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
        Err(e) => panic!("Expected connection refused, got {:?}", e),
        Ok(_) => panic!("Expected connection refused, dial succeeded"),
    }
}
