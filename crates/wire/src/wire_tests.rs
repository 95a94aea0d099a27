// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn round_trip_over_duplex() {
    let (mut client, mut server) = tokio::io::duplex(4096);

    let request = Request::Ping;
    let bytes = encode(&request).unwrap();
    write_message(&mut client, &bytes).await.unwrap();

    let received = read_request(&mut server).await.unwrap();
    assert_eq!(received, request);

    write_response(&mut server, &Response::Pong).await.unwrap();
    let bytes = read_message(&mut client).await.unwrap();
    let response: Response = decode(&bytes).unwrap();
    assert_eq!(response, Response::Pong);
}

#[tokio::test]
async fn closed_connection_reports_cleanly() {
    let (client, mut server) = tokio::io::duplex(64);
    drop(client);
    let err = read_message(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let (mut client, mut server) = tokio::io::duplex(64);
    let len = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes();
    tokio::io::AsyncWriteExt::write_all(&mut client, &len).await.unwrap();
    let err = read_message(&mut server).await.unwrap_err();
    assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
}

#[test]
fn decode_rejects_garbage() {
    assert!(decode::<Request>(b"not json").is_err());
}

#[test]
fn version_is_nonempty() {
    assert!(!PROTOCOL_VERSION.is_empty());
}
