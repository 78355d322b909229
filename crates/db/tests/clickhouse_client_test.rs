//! Integration tests for the ClickHouse HTTP client against a mock server.

use mockito::Matcher;
use poolstats_db::{ClickHouseConn, ConnSettings, DbError};

fn conn(url: &str) -> ClickHouseConn {
    ClickHouseConn::new(&ConnSettings {
        url: url.to_string(),
        database: "dns_logs".to_string(),
        user: "report".to_string(),
        password: Some("hunter2".to_string()),
    })
    .unwrap()
}

#[tokio::test]
async fn parses_json_each_row_responses() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("default_format".into(), "JSONEachRow".into()),
            Matcher::UrlEncoded("database".into(), "dns_logs".into()),
            Matcher::UrlEncoded("param_ip".into(), "192.0.2.10".into()),
        ]))
        .match_header("x-clickhouse-user", "report")
        .match_header("x-clickhouse-key", "hunter2")
        .with_body("{\"UserCC\":\"de\",\"queries\":600}\n{\"UserCC\":\"se\",\"queries\":300}\n")
        .create_async()
        .await;

    let rows = conn(&server.url())
        .query_rows(
            "SELECT UserCC, sum(queries) AS queries FROM by_server_ip_1d WHERE ServerIP = {ip:String}",
            &[("ip", "192.0.2.10".to_string())],
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["UserCC"], "de");
    assert_eq!(rows[1]["queries"], 300);
}

#[tokio::test]
async fn server_errors_surface_status_and_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("Code: 62. DB::Exception: Syntax error\n")
        .create_async()
        .await;

    let err = conn(&server.url())
        .query_rows("SELEC nonsense", &[])
        .await
        .unwrap_err();

    match err {
        DbError::ClickHouse { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("Syntax error"));
        }
        other => panic!("expected clickhouse error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_lines_are_ignored() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_query(Matcher::Any)
        .with_body("\n{\"n\":1}\n\n")
        .create_async()
        .await;

    let rows = conn(&server.url()).query_rows("SELECT 1 AS n", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn ping_round_trips() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/")
        .match_query(Matcher::Any)
        .with_body("{\"1\":1}\n")
        .create_async()
        .await;

    conn(&server.url()).ping().await.unwrap();
}
