//! Integration tests for Paywire

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn paywire(temp: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("paywire");
        cmd.arg("-c")
            .arg(temp.path().join("config.toml"))
            .env_remove("PAYWIRE_API_KEY")
            .env_remove("PAYWIRE_CONFIG");
        cmd
    }

    fn write_config(temp: &TempDir, content: &str) {
        std::fs::write(temp.path().join("config.toml"), content).unwrap();
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("purchases backend client"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("paywire"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[backend]"))
            .stdout(predicate::str::contains("https://api.revenuecat.com"));
    }

    #[test]
    fn config_show_masks_api_key() {
        let temp = TempDir::new().unwrap();
        write_config(&temp, "[backend]\napi_key = \"appl_secretsecret\"\n");

        paywire(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("appl_"))
            .stdout(predicate::str::contains("secretsecret").not());
    }

    #[test]
    fn config_init_then_refuses_to_overwrite() {
        let temp = TempDir::new().unwrap();
        paywire(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").exists());

        paywire(&temp)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let temp = TempDir::new().unwrap();
        write_config(&temp, "[backend\n");

        paywire(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn missing_api_key() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .args(["subscriber", "user"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No API key configured"))
            .stderr(predicate::str::contains("PAYWIRE_API_KEY"));
    }

    #[test]
    fn empty_app_user_id_offerings() {
        let temp = TempDir::new().unwrap();
        paywire(&temp)
            .env("PAYWIRE_API_KEY", "appl_test")
            .args(["offerings", "  "])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid app user id"));
    }

    #[test]
    fn cache_list_empty() {
        let temp = TempDir::new().unwrap();
        let etags = temp.path().join("etags");
        write_config(
            &temp,
            &format!("[cache]\netag_dir = {:?}\n", etags.display().to_string()),
        );

        paywire(&temp)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No ETag entries"));

        paywire(&temp)
            .args(["cache", "clear"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 0"));
    }
}

mod transport_tests {
    use paywire::backend::ReceiptSubmission;
    use paywire::http::body::ProductInfo;
    use paywire::{Config, RequestCoordinator};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serves `responses` in order, one per connection, and hands back the
    /// raw requests it received
    fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                seen.push(read_request(&mut stream));
                stream.write_all(response.as_bytes()).unwrap();
                stream.flush().unwrap();
            }
            seen
        });

        (base_url, handle)
    }

    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&data).to_string()
    }

    fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut out = format!("HTTP/1.1 {}\r\n", status);
        for (name, value) in headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        ));
        out
    }

    fn config(base_url: &str) -> Config {
        let mut config = Config::default();
        config.backend.base_url = base_url.to_string();
        config.backend.api_key = Some("appl_integration".to_string());
        config.backend.timeout_secs = 5;
        config.client.platform_flavor = "flutter".to_string();
        config.client.sandbox = true;
        config.cache.persist = false;
        config
    }

    const SUBSCRIBER: &str = r#"{"subscriber": {"original_app_user_id": "user one"}}"#;

    #[tokio::test]
    async fn headers_and_etag_round_trip() {
        let (base_url, server) = serve(vec![
            response(
                "200 OK",
                &[
                    ("Content-Type", "application/json"),
                    ("X-RevenueCat-ETag", "etag-1"),
                ],
                SUBSCRIBER,
            ),
            response("304 Not Modified", &[], ""),
        ]);

        let coordinator = RequestCoordinator::from_config(&config(&base_url)).unwrap();
        let fresh = coordinator.fetch_subscriber_state("user one").await.unwrap();
        let cached = coordinator.fetch_subscriber_state("user one").await.unwrap();
        assert_eq!(fresh, cached);
        assert_eq!(cached.subscriber.original_app_user_id, "user one");

        let requests: Vec<String> = server
            .join()
            .unwrap()
            .into_iter()
            .map(|r| r.to_lowercase())
            .collect();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].starts_with("get /v1/subscribers/user%20one http/1.1"));
        assert!(requests[0].contains("authorization: bearer appl_integration"));
        assert!(requests[0].contains("x-platform-flavor: flutter"));
        assert!(requests[0].contains("x-is-sandbox: true"));
        assert!(requests[1].contains("if-none-match: etag-1"));
    }

    #[tokio::test]
    async fn non_finite_price_is_never_sent() {
        let (base_url, server) = serve(vec![response(
            "200 OK",
            &[("Content-Type", "application/json")],
            SUBSCRIBER,
        )]);
        let coordinator = RequestCoordinator::from_config(&config(&base_url)).unwrap();

        let mut submission = ReceiptSubmission::new(b"receipt".to_vec(), "user one");
        submission.product = Some(ProductInfo::new("pro", f64::NAN));
        let err = coordinator.submit_receipt(submission).await.unwrap_err();
        assert!(err.is_network());

        coordinator.fetch_subscriber_state("user one").await.unwrap();

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("GET "));
    }

    #[tokio::test]
    async fn server_error_without_body_is_network_error() {
        let (base_url, server) = serve(vec![response("503 Service Unavailable", &[], "")]);
        let coordinator = RequestCoordinator::from_config(&config(&base_url)).unwrap();

        let err = coordinator.fetch_subscriber_state("user").await.unwrap_err();
        assert!(err.is_network());
        assert!(!err.is_finishable());

        server.join().unwrap();
    }

    #[tokio::test]
    async fn backend_error_body_is_decoded() {
        let (base_url, server) = serve(vec![response(
            "401 Unauthorized",
            &[("Content-Type", "application/json")],
            r#"{"code": 7225, "message": "Invalid API key."}"#,
        )]);
        let coordinator = RequestCoordinator::from_config(&config(&base_url)).unwrap();

        let err = coordinator.login("old", "new").await.unwrap_err();
        assert!(err.is_finishable());
        assert!(err.to_string().contains("Invalid API key."));

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("POST /v1/subscribers/identify"));
        assert!(requests[0].contains(r#""new_app_user_id":"new""#));
    }
}
