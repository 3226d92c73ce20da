//! Integration tests for the TCP transport.
//!
//! These spin up a real loopback listener and check that bytes flow in
//! both directions and that a clean close shows up as `Ok(None)`.

#[cfg(feature = "tcp")]
mod tcp {
    use kivups_transport::{Connection, Connector, TcpConnector, TransportError};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_tcp_connect_send_and_receive() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 5];
            stream.read_exact(&mut buf).await.expect("read");
            assert_eq!(&buf, b"hello");
            stream.write_all(b"world\n").await.expect("write");
        });

        let conn = TcpConnector::new().connect(&addr).await.expect("connect");
        conn.send(b"hello").await.expect("send");

        let mut received = Vec::new();
        while received.len() < 6 {
            let chunk = conn.recv().await.expect("recv").expect("open");
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, b"world\n");

        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_tcp_recv_returns_none_on_peer_close() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            drop(stream);
        });

        let conn = TcpConnector::new().connect(&addr).await.expect("connect");
        server.await.expect("server task");

        let got = conn.recv().await.expect("recv should not error");
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_tcp_chunk_size_limits_single_read() {
        let (listener, addr) = listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            stream.write_all(b"0123456789").await.expect("write");
            // Keep the socket open until the client is done reading.
            let mut buf = [0u8; 1];
            let _ = stream.read(&mut buf).await;
        });

        let conn = TcpConnector::new()
            .with_chunk_size(4)
            .connect(&addr)
            .await
            .expect("connect");

        let chunk = conn.recv().await.expect("recv").expect("open");
        assert!(chunk.len() <= 4);
        assert!(b"0123456789".starts_with(&chunk));

        conn.close().await.expect("close");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_tcp_connect_to_closed_port_fails() {
        // Bind then drop so the port is very likely free.
        let (listener, addr) = listener().await;
        drop(listener);

        let result = TcpConnector::new().connect(&addr).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn test_tcp_connections_get_distinct_ids() {
        let (listener, addr) = listener().await;
        let server = tokio::spawn(async move {
            let a = listener.accept().await.expect("accept");
            let b = listener.accept().await.expect("accept");
            (a, b)
        });

        let connector = TcpConnector::new();
        let a = connector.connect(&addr).await.expect("connect");
        let b = connector.connect(&addr).await.expect("connect");
        assert_ne!(a.id(), b.id());

        let _ = server.await.expect("server task");
    }
}
