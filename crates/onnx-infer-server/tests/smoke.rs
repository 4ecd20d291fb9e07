//! Smoke test for the onnx-infer-server binary.
//!
//! Marked `#[ignore]` because it spawns the real binary and binds a real
//! port; CI that wants it should run `cargo test --test smoke -- --ignored`
//! with a reachable (even if empty) MongoDB instance.
//!
//! Env vars:
//! - `ONNX_TEST_TIMEOUT`: startup timeout in seconds (default 30)

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    fn spawn(http_bind: &str, grpc_bind: &str) -> Self {
        let binary = env!("CARGO_BIN_EXE_onnx-infer-server");
        let child = Command::new(binary)
            .env("HTTP_BIND", http_bind)
            .env("GRPC_BIND", grpc_bind)
            .env("MONGO_URI", "mongodb://127.0.0.1:27017")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn onnx-infer-server");

        let stderr = child.stderr.as_ref().unwrap().try_clone();
        if let Ok(stderr) = stderr {
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().flatten() {
                    eprintln!("[server] {line}");
                }
            });
        }

        Self { child }
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn timeout() -> Duration {
    let secs = std::env::var("ONNX_TEST_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    Duration::from_secs(secs)
}

#[tokio::test]
#[ignore]
async fn healthz_responds_once_bound() {
    let server = ServerProcess::spawn("127.0.0.1:18080", "127.0.0.1:18081");
    let client = reqwest::Client::new();
    let start = Instant::now();

    loop {
        if start.elapsed() > timeout() {
            panic!("server never became reachable on /healthz");
        }
        match client.get("http://127.0.0.1:18080/healthz").send().await {
            Ok(resp) if resp.status().is_success() => break,
            _ => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }

    drop(server);
}
