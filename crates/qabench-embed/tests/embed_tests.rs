use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use qabench_core::config::{EncoderConfig, EncoderKind};
use qabench_core::traits::Encoder;
use qabench_core::Error;
use qabench_embed::{get_default_encoder, HttpEncoder};

/// Serves one canned HTTP response and hands back the request body.
fn serve_once(status: &'static str, body: String) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/v1/embeddings", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() { break; }
            let lower = line.to_ascii_lowercase();
            if let Some(v) = lower.strip_prefix("content-length:") { content_length = v.trim().parse().unwrap(); }
        }
        let mut request = vec![0u8; content_length];
        reader.read_exact(&mut request).unwrap();
        let mut stream = stream;
        write!(stream, "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}", status, body.len(), body).unwrap();
        stream.flush().unwrap();
        String::from_utf8(request).unwrap()
    });
    (endpoint, handle)
}

fn http_config(endpoint: String, dim: usize) -> EncoderConfig {
    EncoderConfig {
        kind: EncoderKind::Http,
        dim,
        endpoint,
        passage_model: "ctx-model".to_string(),
        query_model: Some("question-model".to_string()),
        api_key_env: "QABENCH_TEST_UNSET_KEY".to_string(),
        timeout_secs: 5,
        ..EncoderConfig::default()
    }
}

#[test]
fn default_encoder_is_the_hashing_encoder() {
    let config = EncoderConfig { dim: 32, ..EncoderConfig::default() };
    let encoder = get_default_encoder(&config).expect("encoder");
    assert_eq!(encoder.dim(), 32);
    let v = encoder.encode_query("hello world").unwrap();
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-4);
}

#[test]
fn http_encoder_orders_passages_by_response_index() {
    let body = r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#.to_string();
    let (endpoint, server) = serve_once("200 OK", body);
    let encoder = HttpEncoder::new(&http_config(endpoint, 2)).unwrap();
    let out = encoder.encode_passages(&["first".to_string(), "second".to_string()]).expect("embeddings");
    assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    let request = server.join().unwrap();
    assert!(request.contains("\"ctx-model\""), "passages use the passage model: {request}");
}

#[test]
fn http_encoder_uses_the_question_model_for_queries() {
    let body = r#"{"data":[{"embedding":[0.5,0.5,0.0],"index":0}]}"#.to_string();
    let (endpoint, server) = serve_once("200 OK", body);
    let encoder = HttpEncoder::new(&http_config(endpoint, 3)).unwrap();
    assert_eq!(encoder.encode_query("why?").unwrap(), vec![0.5, 0.5, 0.0]);
    assert!(server.join().unwrap().contains("\"question-model\""));
}

#[test]
fn http_encoder_surfaces_service_errors() {
    let body = r#"{"error":{"message":"model not loaded"}}"#.to_string();
    let (endpoint, server) = serve_once("503 Service Unavailable", body);
    let encoder = HttpEncoder::new(&http_config(endpoint, 2)).unwrap();
    let err = encoder.encode_query("q").unwrap_err();
    server.join().unwrap();
    match err {
        Error::Encoder(msg) => assert!(msg.contains("model not loaded"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn http_encoder_rejects_wrong_widths() {
    let body = r#"{"data":[{"embedding":[1.0,2.0,3.0],"index":0}]}"#.to_string();
    let (endpoint, server) = serve_once("200 OK", body);
    let encoder = HttpEncoder::new(&http_config(endpoint, 2)).unwrap();
    let err = encoder.encode_query("q").unwrap_err();
    server.join().unwrap();
    assert!(err.is_encoder_failure(), "service-side widths follow the skip policy: {err:?}");
    match err {
        Error::Encoder(msg) => assert!(msg.contains("expected 2, found 3"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
