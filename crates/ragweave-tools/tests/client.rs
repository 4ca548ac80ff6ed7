use ragweave_tools::ExternalToolClient;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn discovers_and_invokes_a_matching_tool() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "tools": [
                    { "name": "weather_lookup", "description": "get current weather for a city" }
                ]
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": { "content": "it is sunny in paris" }
        })))
        .mount(&server)
        .await;

    let client = ExternalToolClient::new(vec![server.uri()], Duration::from_secs(60), Duration::from_secs(5));
    let results = client.search("what is the weather in paris").await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_name, "weather_lookup");
    assert_eq!(results[0].score, 1.0);
    assert_eq!(results[0].content, "it is sunny in paris");
}

#[tokio::test]
async fn query_with_no_matching_tools_returns_empty() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "tools": [
                    { "name": "weather_lookup", "description": "get current weather for a city" }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = ExternalToolClient::new(vec![server.uri()], Duration::from_secs(60), Duration::from_secs(5));
    let results = client.search("translate this sentence to spanish").await;

    assert!(results.is_empty());
}
