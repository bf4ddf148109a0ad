//! Scripted-server helpers shared by the connection tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::client::ClientConfig;
use crate::connection::{Connection, ConnectionTasks};
use crate::msg::Msg;
use crate::protocol::constants::{CHALLENGE_LEN, MAX_FRAME_SIZE, PROTOCOL_VERSION};
use crate::protocol::frame;

pub async fn recv_req(sock: &mut TcpStream) -> Msg {
    frame::read_frame(sock, MAX_FRAME_SIZE).await.unwrap()
}

/// True once the peer has closed the connection
pub async fn recv_eof(sock: &mut TcpStream) -> bool {
    frame::read_frame(sock, MAX_FRAME_SIZE).await.is_err()
}

pub async fn send_msg(sock: &mut TcpStream, m: &Msg) {
    sock.write_all(&frame::frame_bytes(m)).await.unwrap();
}

pub fn reply_to(req: &Msg) -> Msg {
    let mut m = Msg::new();
    m.put_u32("seq", req.get_u32("seq").unwrap());
    m
}

/// Accept one client and walk it through the full handshake, asserting
/// the shape of every request on the way
pub async fn accept_and_handshake(listener: &TcpListener) -> TcpStream {
    let (mut sock, _) = listener.accept().await.unwrap();

    let hello = recv_req(&mut sock).await;
    assert_eq!(hello.method(), Some("hello"));
    assert_eq!(hello.get_str("clientname"), Some("htsp-rs"));
    assert_eq!(hello.get_u32("htspversion"), Some(PROTOCOL_VERSION));
    let mut reply = reply_to(&hello);
    reply.put_bin("challenge", Bytes::from_static(&[7u8; CHALLENGE_LEN]));
    reply.put_str("servername", "Tvheadend");
    reply.put_u32("htspversion", PROTOCOL_VERSION);
    send_msg(&mut sock, &reply).await;

    let login = recv_req(&mut sock).await;
    assert_eq!(login.method(), Some("login"));
    send_msg(&mut sock, &reply_to(&login)).await;

    let enable = recv_req(&mut sock).await;
    assert_eq!(enable.method(), Some("enableAsyncMetadata"));
    send_msg(&mut sock, &reply_to(&enable)).await;

    sock
}

pub async fn open_conn(addr: SocketAddr) -> (Arc<Connection>, ConnectionTasks) {
    Connection::open(&addr.ip().to_string(), addr.port(), &ClientConfig::default())
        .await
        .unwrap()
}

/// Poll a condition set by a background task, with a bounded wait
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
