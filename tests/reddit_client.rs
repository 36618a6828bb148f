use mockito::{Matcher, Server, ServerGuard};
use rtail::{ContentSource, Credentials, ListenerOptions, RedditClient, Recency, DELETED_AUTHOR};
use time::macros::datetime;

fn client_for(server: &ServerGuard) -> RedditClient {
    let opts = ListenerOptions::default()
        .with_subreddits(["rust", "tokio"])
        .with_api_base(server.url())
        .with_auth_url(format!("{}/api/v1/access_token", server.url()))
        .with_max_retries(2)
        .with_credentials(Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            user_agent: "rtail-test/0.1".to_string(),
        });
    RedditClient::new(&opts).unwrap()
}

fn channels() -> Vec<String> {
    vec!["rust".to_string(), "tokio".to_string()]
}

async fn mock_token(server: &mut ServerGuard, hits: usize) -> mockito::Mock {
    server
        .mock("POST", "/api/v1/access_token")
        .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
        .match_body("grant_type=client_credentials")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "tok123", "token_type": "bearer", "expires_in": 3600}"#)
        .expect(hits)
        .create_async()
        .await
}

const POSTS_BODY: &str = r#"
{
    "kind": "Listing",
    "data": {
        "after": "t3_b2",
        "children": [
            {"kind": "t3", "data": {
                "id": "b2", "name": "t3_b2", "title": "Second", "selftext": "",
                "subreddit": "rust", "url": "https://example.com/b2",
                "created_utc": 1704067210.0, "score": 5, "num_comments": 2,
                "author": null
            }},
            {"kind": "t3", "data": {
                "id": "a1", "name": "t3_a1", "title": "First", "selftext": "body",
                "subreddit": "tokio", "url": "https://example.com/a1",
                "created_utc": 1704067201.7, "score": 1, "num_comments": 0,
                "author": "carol"
            }}
        ]
    }
}
"#;

/// Token exchange followed by a newest-posts listing:
/// - both channels are addressed in one path;
/// - the bearer token and paging params are sent;
/// - a null author becomes the deleted placeholder and the cursor is returned.
#[tokio::test]
async fn new_posts_parses_listing() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 1).await;
    let listing = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_header("authorization", "bearer tok123")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("limit".into(), "100".into()),
            Matcher::UrlEncoded("after".into(), "t3_z9".into()),
            Matcher::UrlEncoded("raw_json".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(POSTS_BODY)
        .create_async()
        .await;

    let client = client_for(&server);
    let page = client.new_posts(&channels(), 100, Some("t3_z9")).await.unwrap();

    assert_eq!(page.after.as_deref(), Some("t3_b2"));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, "b2");
    assert_eq!(page.items[0].author, DELETED_AUTHOR);
    assert_eq!(page.items[0].created_utc, datetime!(2024-01-01 0:00:10 UTC));
    assert_eq!(page.items[1].author, "carol");
    assert_eq!(page.items[1].created_utc, datetime!(2024-01-01 0:00:01 UTC));

    token.assert_async().await;
    listing.assert_async().await;
}

/// Keyword search sends the query, newest-first sort and a one-day window restricted
/// to the channels. The token is fetched once and reused.
#[tokio::test]
async fn search_posts_sends_search_params() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 1).await;
    let listing = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/search".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "serde OR tokio".into()),
            Matcher::UrlEncoded("sort".into(), "new".into()),
            Matcher::UrlEncoded("t".into(), "day".into()),
            Matcher::UrlEncoded("restrict_sr".into(), "1".into()),
            Matcher::UrlEncoded("limit".into(), "25".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"kind": "Listing", "data": {"after": null, "children": []}}"#)
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server);
    for _ in 0..2 {
        let page = client
            .search_posts(&channels(), "serde OR tokio", Recency::Day, 25, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.after, None);
    }

    token.assert_async().await;
    listing.assert_async().await;
}

/// Comments listing maps parent and link ids; an empty `after` means no more pages.
#[tokio::test]
async fn new_comments_parses_listing() {
    let mut server = Server::new_async().await;
    mock_token(&mut server, 1).await;
    server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/comments".to_string()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"data": {"after": "", "children": [
                {"kind": "t1", "data": {
                    "id": "c1", "name": "t1_c1", "body": "nice", "subreddit": "rust",
                    "created_utc": 1704067200, "score": 3, "author": "",
                    "parent_id": "t3_a1", "link_id": "t3_a1"
                }}
            ]}}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let page = client.new_comments(&channels(), 100, None).await.unwrap();
    assert_eq!(page.after, None);
    assert_eq!(page.items.len(), 1);
    let c = &page.items[0];
    assert_eq!(c.name, "t1_c1");
    assert_eq!(c.parent_id, "t3_a1");
    assert_eq!(c.author, DELETED_AUTHOR);
}

/// A 429 with `Retry-After: 0` is retried and the next response is used.
#[tokio::test]
async fn rate_limit_is_retried() {
    let mut server = Server::new_async().await;
    mock_token(&mut server, 1).await;
    let limited = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "0")
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(POSTS_BODY)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let page = client.new_posts(&channels(), 100, None).await.unwrap();
    assert_eq!(page.items.len(), 2);

    limited.assert_async().await;
    ok.assert_async().await;
}

/// A rejected token is refreshed once and the request repeated.
#[tokio::test]
async fn unauthorized_refreshes_token() {
    let mut server = Server::new_async().await;
    let token = mock_token(&mut server, 2).await;
    server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(POSTS_BODY)
        .create_async()
        .await;

    let client = client_for(&server);
    let page = client.new_posts(&channels(), 100, None).await.unwrap();
    assert_eq!(page.items.len(), 2);
    token.assert_async().await;
}

/// Other client errors fail immediately without retrying.
#[tokio::test]
async fn forbidden_fails_without_retry() {
    let mut server = Server::new_async().await;
    mock_token(&mut server, 1).await;
    let forbidden = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body("private subreddit")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.new_posts(&channels(), 100, None).await.unwrap_err();
    assert!(err.to_string().contains("403"));
    forbidden.assert_async().await;
}

/// A success status with a body that is not a listing is a parse error, not retried.
#[tokio::test]
async fn malformed_listing_is_a_parse_error() {
    let mut server = Server::new_async().await;
    mock_token(&mut server, 1).await;
    let garbage = server
        .mock("GET", Matcher::Regex(r"^/r/rust\+tokio/new".to_string()))
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("<html>maintenance</html>")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.new_posts(&channels(), 100, None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse listing"));
    garbage.assert_async().await;
}

/// A failed token exchange surfaces as a fetch error.
#[tokio::test]
async fn token_failure_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/v1/access_token")
        .with_status(401)
        .with_body(r#"{"message": "Unauthorized"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.new_posts(&channels(), 100, None).await.unwrap_err();
    assert!(format!("{:#}", err).contains("token request failed"));
}
