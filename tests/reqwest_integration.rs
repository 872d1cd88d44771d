//! Exchanges over the reqwest transport against a local mock server.

use exchange_core::http::headers;
use exchange_core::{
    AuthScope, CookieStore, Credentials, ExchangeClient, ExchangeError, HttpRequest, RequestConfig,
};
use reqwest::StatusCode;
use url::Url;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

fn get(uri: &str) -> HttpRequest {
    HttpRequest::get(Url::parse(uri).unwrap())
}

#[tokio::test]
async fn test_basic_challenge_answered_over_reqwest() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Basic realm=\"mock\""),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ExchangeClient::new().unwrap();
    client
        .credentials()
        .set_credentials(AuthScope::any(), Credentials::basic("user", "pass"));

    let mut response = client
        .execute(get(&format!("{}/secure", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap(), b"welcome");
}

#[tokio::test]
async fn test_redirect_followed_with_cookie_over_reqwest() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/end")
                .insert_header("Set-Cookie", "sid=abc; Path=/"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .and(header("cookie", "sid=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ExchangeClient::new().unwrap();
    let mut ctx = client.new_context();
    let mut response = client
        .execute_with_context(get(&format!("{}/start", mock_server.uri())), &mut ctx)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap(), b"done");
    assert_eq!(ctx.redirect_locations.len(), 1);
    assert_eq!(ctx.redirect_locations[0].path(), "/end");
    assert_eq!(client.cookie_store().cookies().len(), 1);
}

#[tokio::test]
async fn test_redirect_loop_stops_at_limit_over_reqwest() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/b"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/c"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/d"))
        .mount(&mock_server)
        .await;

    let client = ExchangeClient::builder()
        .default_config(RequestConfig::default().with_max_redirects(2))
        .build()
        .unwrap();

    let err = client
        .execute(get(&format!("{}/a", mock_server.uri())))
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::RedirectLimitExceeded { max: 2 }));
}

#[tokio::test]
async fn test_transport_sends_user_agent() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/ua"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ExchangeClient::new().unwrap();
    let response = client
        .execute(get(&format!("{}/ua", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.header_str(&headers::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0");
        let Ok(listener) = listener else {
            return;
        };
        listener.local_addr().unwrap().port()
    };

    let client = ExchangeClient::new().unwrap();
    let err = client
        .execute(get(&format!("http://127.0.0.1:{port}/")))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::Transport { .. } | ExchangeError::Timeout { .. }
    ));
}
