mod common;

use common::Tree;
use pathwise::{App, Controller, ControllerRegistry, Fault, Request, Server};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

async fn echo(req: Request) -> Result<Value, Fault> {
    Ok(json!({ "id": req.param("id"), "name": req.input("name") }))
}

async fn send(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn serves_over_tcp_and_drains_on_shutdown() {
    let tree = Tree::new();
    tree.controller("users/[id]/index", &["post"]);
    let dispatcher = App::new(tree.settings())
        .controllers(ControllerRegistry::new().register("main/users/[id]/index", Controller::new().post(echo)))
        .build()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(Server::serve_with(listener, dispatcher, async move {
        let _ = stopped.await;
    }));

    let body = r#"{"name":"ada"}"#;
    let response = send(
        addr,
        &format!(
            "POST /users/7 HTTP/1.1\r\nhost: localhost\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        ),
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.ends_with(r#"{"id":"7","name":"ada"}"#), "{response}");

    let response = send(addr, "GET /missing HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[test]
fn bind_rejects_malformed_addresses() {
    assert!(Server::bind("not an address").is_err());
    assert!(Server::bind("127.0.0.1:3000").is_ok());
}
