//! Tests for the request assembler

use std::time::Duration;

use library_mcp::config::ReadPolicy;
use library_mcp::http::{AssembleError, Assembly, RequestAssembler};
use tokio::io::AsyncWriteExt;

fn policy() -> ReadPolicy {
    ReadPolicy::default()
}

fn block_of(assembly: Assembly) -> (Vec<u8>, bool) {
    match assembly {
        Assembly::Request { block, complete } => (block, complete),
        Assembly::Empty => panic!("expected a request"),
    }
}

#[tokio::test]
async fn test_assembles_simple_get() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    client.write_all(b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(complete);
    assert_eq!(block, b"GET /ping HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(assembler.buffered(), 0);
}

#[tokio::test]
async fn test_zero_bytes_is_empty_probe() {
    let (_client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    let started = std::time::Instant::now();
    let assembly = assembler.next_request(None).await.unwrap();
    assert_eq!(assembly, Assembly::Empty);
    // Gave up after the idle budget, not immediately and not forever
    assert!(started.elapsed() >= Duration::from_millis(90));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_closed_peer_is_empty() {
    let (client, server) = tokio::io::duplex(8192);
    drop(client);
    let mut assembler = RequestAssembler::new(server, policy());
    assert_eq!(assembler.next_request(None).await.unwrap(), Assembly::Empty);
    assert!(assembler.is_eof());
}

#[tokio::test]
async fn test_body_read_to_content_length_across_writes() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    let body = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
    let head = format!("POST /mcp HTTP/1.1\r\nContent-Length: {}\r\n\r\n", body.len());

    let writer = tokio::spawn(async move {
        client.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        client.write_all(body.as_bytes()).await.unwrap();
        client
    });

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(complete);
    assert!(block.ends_with(body.as_bytes()));
    let _client = writer.await.unwrap();
}

#[tokio::test]
async fn test_body_larger_than_header_cap() {
    let (mut client, server) = tokio::io::duplex(64 * 1024);
    let mut assembler = RequestAssembler::new(server, policy());

    let body = "x".repeat(10_000);
    let raw = format!("POST /mcp HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}", body.len(), body);
    client.write_all(raw.as_bytes()).await.unwrap();

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(complete);
    assert_eq!(block.len(), raw.len());
}

#[tokio::test]
async fn test_pipelined_requests_are_split() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    client
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}GET /ping HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let (first, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(complete);
    assert_eq!(first, b"POST /mcp HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}");

    let (second, complete) = block_of(
        assembler
            .next_request(Some(Duration::from_millis(50)))
            .await
            .unwrap(),
    );
    assert!(complete);
    assert_eq!(second, b"GET /ping HTTP/1.1\r\n\r\n");
}

#[tokio::test]
async fn test_declared_body_over_limit_rejected() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    client
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 99999999\r\n\r\n")
        .await
        .unwrap();

    match assembler.next_request(None).await {
        Err(AssembleError::BodyTooLarge { declared, limit }) => {
            assert_eq!(declared, 99_999_999);
            assert_eq!(limit, 1024 * 1024);
        }
        other => panic!("expected BodyTooLarge, got {:?}", other),
    }
}

#[tokio::test]
async fn test_header_cap_hands_over_partial_block() {
    let (mut client, server) = tokio::io::duplex(16 * 1024);
    let mut assembler = RequestAssembler::new(server, policy());

    let mut raw = b"GET /ping HTTP/1.1\r\nX-Filler: ".to_vec();
    raw.extend(std::iter::repeat(b'a').take(6000));
    client.write_all(&raw).await.unwrap();

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(!complete);
    assert_eq!(block.len(), 4096);
}

#[tokio::test]
async fn test_truncated_body_is_incomplete() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    client
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 100\r\n\r\n{\"partial\":")
        .await
        .unwrap();

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(!complete);
    assert!(block.ends_with(b"{\"partial\":"));
}

#[tokio::test]
async fn test_keep_alive_wait_expires_to_empty() {
    let (_client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());
    let assembly = assembler
        .next_request(Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert_eq!(assembly, Assembly::Empty);
}

#[tokio::test]
async fn test_small_chunks_still_assemble() {
    let (mut client, server) = tokio::io::duplex(8192);
    let policy = ReadPolicy {
        chunk_size: 4,
        ..ReadPolicy::default()
    };
    let mut assembler = RequestAssembler::new(server, policy);

    client.write_all(b"GET /help HTTP/1.1\r\n\r\n").await.unwrap();
    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(complete);
    assert_eq!(block, b"GET /help HTTP/1.1\r\n\r\n");
}

#[tokio::test]
async fn test_post_without_content_length_takes_buffered_body() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    let raw = b"POST /mcp HTTP/1.1\r\nHost: x\r\n\r\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}";
    client.write_all(raw).await.unwrap();

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(!complete);
    assert_eq!(block, raw.to_vec());
    assert_eq!(assembler.buffered(), 0);
}

#[tokio::test]
async fn test_post_without_content_length_body_sent_later() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    let writer = tokio::spawn(async move {
        client.write_all(b"POST /mcp HTTP/1.1\r\n\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        client.write_all(b"{}").await.unwrap();
        client
    });

    let (block, complete) = block_of(assembler.next_request(None).await.unwrap());
    assert!(!complete);
    assert!(block.ends_with(b"\r\n\r\n{}"));
    let _client = writer.await.unwrap();
}

#[tokio::test]
async fn test_invalid_content_length_rejected() {
    let (mut client, server) = tokio::io::duplex(8192);
    let mut assembler = RequestAssembler::new(server, policy());

    client
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 12abc\r\n\r\n{}")
        .await
        .unwrap();

    match assembler.next_request(None).await {
        Err(AssembleError::InvalidContentLength(raw)) => assert_eq!(raw, "12abc"),
        other => panic!("expected InvalidContentLength, got {:?}", other),
    }
}
