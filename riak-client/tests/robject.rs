use bytes::Bytes;
use riak_client::test_utils::mock_client;
use riak_client::{
    ClientConfig, ClientError, Link, Method, ObjectState, Payload, Quorum, RObject, ReloadOptions,
    Response, StoreOptions,
};
use serde_json::json;

const BOUNDARY: &str = "YinLMzyUR9feB17okMytgKsylvh";

fn siblings_body() -> String {
    format!(
        "\r\n--{b}\r\n\
Content-Type: application/x-www-form-urlencoded\r\n\
Link: </riak/test>; rel=\"up\"\r\n\
Etag: 16vic4eU9ny46o4KPiDz1f\r\n\
Last-Modified: Wed, 10 Mar 2010 18:01:06 GMT\r\n\
\r\n\
bar\r\n\
--{b}\r\n\
Content-Type: application/json\r\n\
Link: </riak/test>; rel=\"up\"\r\n\
Etag: 4v5xOg4bVwUYZdMkqf0d6I\r\n\
Last-Modified: Wed, 10 Mar 2010 18:00:04 GMT\r\n\
\r\n\
{{\"foo\":\"bar\"}}\r\n\
--{b}--\r\n",
        b = BOUNDARY
    )
}

fn conflict_response() -> Response {
    Response::new(300)
        .with_header("Content-Type", format!("multipart/mixed; boundary={}", BOUNDARY))
        .with_header("X-Riak-Vclock", "a85hYGBgzGDKBVIsrGJ")
        .with_body(siblings_body())
}

fn config() -> ClientConfig {
    ClientConfig::default().with_client_id("tests")
}

#[tokio::test]
async fn test_store_without_content_type_fails_before_sending() {
    let (client, transport) = mock_client(config());
    let mut object = client.bucket("people").new_object(Some("sean"));
    object.set_data(json!({"name": "Sean"}));

    let err = object.store(StoreOptions::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Precondition(_)));
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_store_new_object_posts_and_takes_assigned_key() {
    let (client, transport) = mock_client(config());
    transport.push_response(
        Response::new(201)
            .with_header("Location", "/riak/people/Kb9Yl2qBzw0gsVnh0rLMl0fWk3K")
            .with_header("Content-Type", "application/json")
            .with_header("X-Riak-Vclock", "a85hYGBgzGDKBVIsrGJ")
            .with_body(r#"{"name":"Sean"}"#),
    );

    let mut object = client.bucket("people").new_object(None);
    object.set_content_type("application/json");
    object.set_data(json!({"name": "Sean"}));
    object.store(StoreOptions::default()).await.unwrap();

    assert_eq!(object.key(), Some("Kb9Yl2qBzw0gsVnh0rLMl0fWk3K"));
    assert_eq!(object.state(), ObjectState::Stored);
    assert_eq!(object.vclock().map(|v| v.as_str()), Some("a85hYGBgzGDKBVIsrGJ"));

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/riak/people");
    assert_eq!(request.expect, vec![201]);
    assert_eq!(request.query_value("returnbody"), Some("true"));
    assert_eq!(request.header_value("content-type"), Some("application/json"));
    assert_eq!(request.header_value("x-riak-clientid"), Some("tests"));
    let sent: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(sent, json!({"name": "Sean"}));
}

#[tokio::test]
async fn test_store_existing_object_puts_metadata_and_links() {
    let (client, transport) = mock_client(config());
    transport.push_response(Response::new(204));

    let mut object = client.bucket("people").new_object(Some("sean"));
    object.set_content_type("text/plain");
    object.set_data("hello");
    object.set_vclock("vclock-token");
    object.links_mut().insert(Link::new("/riak/people", "up"));
    object.links_mut().insert(Link::new("/riak/people/mark", "friend"));
    object.meta_mut().insert("color".to_string(), "blue".to_string());

    let options = StoreOptions {
        returnbody: false,
        w: Some(Quorum::N(2)),
        dw: Some(Quorum::One),
        ..Default::default()
    };
    object.store(options).await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.path, "/riak/people/sean");
    assert_eq!(request.expect, vec![200, 204, 300]);
    assert_eq!(request.query_value("returnbody"), Some("false"));
    assert_eq!(request.query_value("w"), Some("2"));
    assert_eq!(request.query_value("dw"), Some("one"));
    assert_eq!(request.query_value("r"), None);
    assert_eq!(request.header_value("x-riak-vclock"), Some("vclock-token"));
    assert_eq!(request.header_value("link"), Some(r#"</riak/people/mark>; rel="friend""#));
    assert_eq!(request.header_value("x-riak-meta-color"), Some("blue"));
    assert_eq!(request.body, Some(Bytes::from("hello")));

    // a bodyless 204 keeps local state
    assert_eq!(object.data(), Some(&Payload::Raw(Bytes::from("hello"))));
    assert_eq!(object.vclock().map(|v| v.as_str()), Some("vclock-token"));
}

#[tokio::test]
async fn test_json_payload_survives_store_and_load() {
    let (client, transport) = mock_client(config());
    transport.push_response(Response::new(204));

    let document = json!({"name": "Sean", "tags": ["a", "b"], "age": 30, "admin": false});
    let mut object = client.bucket("people").new_object(Some("sean"));
    object.set_content_type("application/json");
    object.set_data(document.clone());
    object
        .store(StoreOptions { returnbody: false, ..Default::default() })
        .await
        .unwrap();

    let stored = transport.last_request().unwrap().body.unwrap();
    let mut reloaded = RObject::new(client.bucket("people"), Some("sean".to_string()));
    reloaded
        .load(
            &Response::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(stored),
        )
        .unwrap();
    assert_eq!(reloaded.data(), Some(&Payload::Structured(document)));
}

#[tokio::test]
async fn test_yaml_payload_survives_store_and_load() {
    let (client, transport) = mock_client(config());
    transport.push_response(Response::new(204));

    let document = json!({"name": "Sean", "nested": {"level": 2, "tags": ["x"]}});
    let mut object = client.bucket("people").new_object(Some("sean"));
    object.set_content_type("text/yaml");
    object.set_data(document.clone());
    object
        .store(StoreOptions { returnbody: false, ..Default::default() })
        .await
        .unwrap();

    let stored = transport.last_request().unwrap().body.unwrap();
    let mut reloaded = RObject::new(client.bucket("people"), Some("sean".to_string()));
    reloaded
        .load(&Response::new(200).with_header("Content-Type", "text/yaml").with_body(stored))
        .unwrap();
    assert_eq!(reloaded.data(), Some(&Payload::Structured(document)));
}

#[test]
fn test_non_conflicting_object_is_its_own_sibling() {
    let (client, _) = mock_client(config());
    let mut object = RObject::new(client.bucket("test"), Some("foo".to_string()));
    object
        .load(
            &Response::new(200)
                .with_header("Content-Type", "application/json")
                .with_body(r#"{"foo":"bar"}"#),
        )
        .unwrap();

    let siblings = object.siblings().unwrap();
    assert_eq!(siblings.len(), 1);
    assert!(std::ptr::eq(&siblings[0], &object));
}

#[test]
fn test_conflict_yields_siblings_with_parent_vclock() {
    let (client, _) = mock_client(config());
    let mut object = RObject::new(client.bucket("test").with_allow_mult(true), Some("foo".to_string()));
    object.load(&conflict_response()).unwrap();

    assert!(object.is_conflict());
    assert_eq!(object.data(), Some(&Payload::Raw(Bytes::from(siblings_body()))));

    let siblings = object.siblings().unwrap();
    assert_eq!(siblings.len(), 2);
    for sibling in siblings {
        assert_eq!(sibling.key(), Some("foo"));
        assert_eq!(sibling.vclock().map(|v| v.as_str()), Some("a85hYGBgzGDKBVIsrGJ"));
        assert!(!sibling.is_conflict());
        assert_eq!(sibling.links().len(), 1);
    }
    assert_eq!(siblings[0].content_type(), Some("application/x-www-form-urlencoded"));
    assert_eq!(siblings[0].data(), Some(&Payload::Raw(Bytes::from("bar"))));
    assert_eq!(siblings[0].etag(), Some("16vic4eU9ny46o4KPiDz1f"));
    assert_eq!(siblings[1].data(), Some(&Payload::Structured(json!({"foo": "bar"}))));

    // cached until the next load
    let again = object.siblings().unwrap();
    assert!(std::ptr::eq(siblings.as_ptr(), again.as_ptr()));
}

#[test]
fn test_load_clears_cached_siblings() {
    let (client, _) = mock_client(config());
    let mut object = RObject::new(client.bucket("test").with_allow_mult(true), Some("foo".to_string()));
    object.load(&conflict_response()).unwrap();
    assert_eq!(object.siblings().unwrap().len(), 2);

    object
        .load(
            &Response::new(200)
                .with_header("Content-Type", "text/plain")
                .with_body("resolved"),
        )
        .unwrap();
    assert!(!object.is_conflict());
    assert_eq!(object.siblings().unwrap().len(), 1);
    assert_eq!(object.data(), Some(&Payload::Raw(Bytes::from("resolved"))));
}

#[test]
fn test_bodyless_load_after_conflict_drops_multipart_body() {
    let (client, _) = mock_client(config());
    let mut object = RObject::new(client.bucket("test").with_allow_mult(true), Some("foo".to_string()));
    object.load(&conflict_response()).unwrap();
    assert!(object.data().is_some());

    object.load(&Response::new(204)).unwrap();
    assert!(!object.is_conflict());
    assert!(object.data().is_none());
}

#[tokio::test]
async fn test_conflicted_index_values_are_raw_bodies() {
    let (client, transport) = mock_client(config());
    transport.push_response(
        Response::new(200)
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"keys":["foo"]}"#),
    );
    transport.push_response(conflict_response());

    let bucket = client.bucket("test").with_allow_mult(true);
    let index = bucket.get_index("kind_bin", "x", Default::default()).unwrap();
    let values = index.values().await.unwrap();
    assert_eq!(values, &[Payload::Raw(Bytes::from(siblings_body()))]);
}

#[test]
fn test_multipart_with_non_300_status_is_not_a_conflict() {
    let (client, _) = mock_client(config());
    let mut object = RObject::new(client.bucket("test"), Some("foo".to_string()));
    let mut response = conflict_response();
    response.status = 200;
    object.load(&response).unwrap();
    assert!(!object.is_conflict());
    assert_eq!(object.siblings().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reload_is_noop_without_key_or_vclock() {
    let (client, transport) = mock_client(config());

    let mut unsaved = client.bucket("b").new_object(None);
    unsaved.reload(ReloadOptions { force: true, ..Default::default() }).await.unwrap();

    let mut no_vclock = client.bucket("b").new_object(Some("k"));
    no_vclock.reload(ReloadOptions::default()).await.unwrap();

    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_forced_reload_fetches() {
    let (client, transport) = mock_client(config());
    transport.push_response(
        Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Riak-Vclock", "fresh")
            .with_body("body"),
    );

    let mut object = client.bucket("b").new_object(Some("k"));
    object
        .reload(ReloadOptions { force: true, r: Some(Quorum::Quorum) })
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, Method::Get);
    assert_eq!(request.path, "/riak/b/k");
    assert_eq!(request.expect, vec![200, 304]);
    assert_eq!(request.query_value("r"), Some("quorum"));
    assert_eq!(object.vclock().map(|v| v.as_str()), Some("fresh"));
}

#[tokio::test]
async fn test_conditional_reload_not_modified_keeps_state() {
    let (client, transport) = mock_client(config());
    transport.push_response(
        Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("X-Riak-Vclock", "v1")
            .with_header("ETag", "etag-1")
            .with_header("Last-Modified", "Mon, 12 Jul 2010 21:37:43 GMT")
            .with_body("original"),
    );
    transport.push_response(Response::new(304));

    let bucket = client.bucket("b").with_allow_mult(true);
    let mut object = bucket.get("k", Default::default()).await.unwrap();
    object.reload(ReloadOptions::default()).await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.expect, vec![200, 300, 304]);
    assert_eq!(request.header_value("if-none-match"), Some("etag-1"));
    assert_eq!(
        request.header_value("if-modified-since"),
        Some("Mon, 12 Jul 2010 21:37:43 GMT")
    );
    assert_eq!(object.data(), Some(&Payload::Raw(Bytes::from("original"))));
    assert_eq!(object.vclock().map(|v| v.as_str()), Some("v1"));
}

#[tokio::test]
async fn test_reload_into_conflict() {
    let (client, transport) = mock_client(config());
    transport.push_response(conflict_response());

    let mut object = client.bucket("test").with_allow_mult(true).new_object(Some("foo"));
    object.set_vclock("stale");
    object.reload(ReloadOptions::default()).await.unwrap();

    assert!(object.is_conflict());
    assert_eq!(object.siblings().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unexpected_status_carries_response() {
    let (client, transport) = mock_client(config());
    transport.push_response(Response::new(500).with_body("boom"));

    let mut object = client.bucket("b").new_object(Some("k"));
    object.set_content_type("text/plain");
    let err = object.store(StoreOptions::default()).await.unwrap_err();
    match err {
        ClientError::RequestFailed { method, status, expected, body, .. } => {
            assert_eq!(method, Method::Put);
            assert_eq!(status, 500);
            assert_eq!(expected, vec![200, 204, 300]);
            assert_eq!(body, Bytes::from("boom"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
