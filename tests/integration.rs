use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn vmem_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vmem"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    )
    .unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    )
    .unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/memory.sqlite"

[index]
backend = "sqlite"
name = "doc_chunks"

[chunking]
chunk_size = 1000
chunk_overlap = 100

[retrieval]
default_k = 3

[embedding]
provider = "hash"
dims = 256
"#,
        root.display()
    );

    let config_path = config_dir.join("memory.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn file(tmp: &TempDir, name: &str) -> String {
    tmp.path()
        .join("files")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn run_vmem(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = vmem_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run vmem binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_vmem(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/memory.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_vmem(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_vmem(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_save_and_recall() {
    let (tmp, config_path) = setup_test_env();

    let alpha = file(&tmp, "alpha.md");
    let beta = file(&tmp, "beta.md");
    let gamma = file(&tmp, "gamma.txt");
    let (stdout, stderr, success) = run_vmem(&config_path, &["save", &alpha, &beta, &gamma]);
    assert!(success, "save failed: stdout={}, stderr={}", stdout, stderr);
    assert!(
        stdout.contains("Successfully saved 3 file(s) to memory"),
        "unexpected save output: {}",
        stdout
    );

    let (stdout, _, success) = run_vmem(
        &config_path,
        &["recall", "Kubernetes and Docker deployment infrastructure", "-k", "1"],
    );
    assert!(success, "recall failed");
    assert!(stdout.starts_with("**Result 1**\nSource: "), "got: {}", stdout);
    assert!(stdout.contains("gamma.txt"), "expected gamma.txt, got: {}", stdout);
    assert!(!stdout.contains("**Result 2**"));
}

#[test]
fn test_recall_default_k_returns_three_results() {
    let (tmp, config_path) = setup_test_env();

    let paths = [
        file(&tmp, "alpha.md"),
        file(&tmp, "beta.md"),
        file(&tmp, "gamma.txt"),
    ];
    let mut args = vec!["save"];
    args.extend(paths.iter().map(|p| p.as_str()));
    run_vmem(&config_path, &args);

    let (stdout, _, success) = run_vmem(&config_path, &["recall", "document"]);
    assert!(success);
    assert!(stdout.contains("**Result 3**"));
    assert_eq!(stdout.matches("\n---\n").count(), 2);
}

#[test]
fn test_resave_does_not_duplicate() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");

    run_vmem(&config_path, &["save", &alpha]);
    let (first, _, _) = run_vmem(&config_path, &["sources"]);

    let (_, _, success) = run_vmem(&config_path, &["save", &alpha]);
    assert!(success);
    let (second, _, _) = run_vmem(&config_path, &["sources"]);

    assert_eq!(first, second);
    assert!(second.contains("Memory holds 1 file(s):"));
    assert!(second.contains("alpha.md (1 chunks)"));
}

#[test]
fn test_resave_reflects_latest_content() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");
    run_vmem(&config_path, &["save", &alpha]);

    fs::write(&alpha, "Completely rewritten: this file now talks about gardening tomatoes.").unwrap();
    run_vmem(&config_path, &["save", &alpha]);

    let (stdout, _, _) = run_vmem(&config_path, &["recall", "Rust cargo crates", "-k", "5"]);
    assert!(stdout.contains("gardening tomatoes"));
    assert!(!stdout.contains("cargo and crates"), "stale chunk recalled: {}", stdout);
}

#[test]
fn test_recall_on_empty_memory() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_vmem(&config_path, &["recall", "anything"]);
    assert!(success, "empty recall must not be an error");
    assert_eq!(stdout.trim(), "Nothing found in memory matching your query.");
}

#[test]
fn test_save_unsupported_type_fails_without_writing() {
    let (tmp, config_path) = setup_test_env();
    let image = tmp.path().join("files").join("image.png");
    fs::write(&image, [0x89, b'P', b'N', b'G']).unwrap();

    let (_, stderr, success) = run_vmem(&config_path, &["save", image.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("image.png"), "stderr: {}", stderr);
    assert!(stderr.contains("not supported"));

    let (stdout, _, _) = run_vmem(&config_path, &["sources"]);
    assert_eq!(stdout.trim(), "Memory is empty.");
}

#[test]
fn test_save_missing_file_fails() {
    let (tmp, config_path) = setup_test_env();
    let missing = file(&tmp, "missing.md");

    let (_, stderr, success) = run_vmem(&config_path, &["save", &missing]);
    assert!(!success);
    assert!(stderr.contains("File not found"), "stderr: {}", stderr);
}

#[test]
fn test_corrupt_pdf_fails_whole_save() {
    let (tmp, config_path) = setup_test_env();
    let bad = tmp.path().join("files").join("bad.pdf");
    fs::write(&bad, b"not a valid pdf").unwrap();
    let alpha = file(&tmp, "alpha.md");

    let (_, stderr, success) = run_vmem(&config_path, &["save", &alpha, bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("Error processing"), "stderr: {}", stderr);
    assert!(stderr.contains("bad.pdf"));

    let (stdout, _, _) = run_vmem(&config_path, &["sources"]);
    assert_eq!(stdout.trim(), "Memory is empty.");
}

#[test]
fn test_forget_removes_file() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");
    let beta = file(&tmp, "beta.md");
    run_vmem(&config_path, &["save", &alpha, &beta]);

    let (stdout, _, success) = run_vmem(&config_path, &["forget", &alpha]);
    assert!(success);
    assert!(stdout.contains("Removed 1 chunk(s) for 1 file(s)"));

    let (stdout, _, _) = run_vmem(&config_path, &["sources"]);
    assert!(stdout.contains("beta.md"));
    assert!(!stdout.contains("alpha.md"));
}

#[test]
fn test_invalid_chunking_rejected() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");

    let (_, stderr, success) = run_vmem(
        &config_path,
        &["save", &alpha, "--chunk-size", "100", "--chunk-overlap", "200"],
    );
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_reports_error() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[embedding]\nprovider = \"magic\"\n").unwrap();

    let (_, stderr, success) = run_vmem(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Unknown embedding provider"), "stderr: {}", stderr);
}

#[test]
fn test_logs_stay_off_stdout() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");

    let output = Command::new(vmem_binary())
        .env("RUST_LOG", "debug")
        .arg("--config")
        .arg(&config_path)
        .args(["save", &alpha])
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert_eq!(stdout.lines().count(), 1, "stdout: {}", stdout);
}

/// Read newline-delimited JSON-RPC messages until the response with `id`.
fn read_response(reader: &mut impl BufRead, id: u64) -> serde_json::Value {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).unwrap();
        assert!(n > 0, "server closed stdout before answering id {}", id);
        let msg: serde_json::Value = match serde_json::from_str(line.trim()) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if msg.get("id").and_then(|v| v.as_u64()) == Some(id) {
            return msg;
        }
    }
}

#[test]
fn test_mcp_stdio_session() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file(&tmp, "alpha.md");

    let mut child = Command::new(vmem_binary())
        .arg("--config")
        .arg(&config_path)
        .args(["serve", "stdio"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());

    let mut send = |msg: serde_json::Value| {
        writeln!(stdin, "{}", msg).unwrap();
        stdin.flush().unwrap();
    };

    send(serde_json::json!({
        "jsonrpc": "2.0", "id": 1, "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "integration-test", "version": "0.0.0" }
        }
    }));
    let init = read_response(&mut stdout, 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "vector-memory");

    send(serde_json::json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }));

    send(serde_json::json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }));
    let list = read_response(&mut stdout, 2);
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"save_to_memory"));
    assert!(names.contains(&"recall_from_memory"));

    send(serde_json::json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": { "name": "save_to_memory", "arguments": { "file_paths": [alpha] } }
    }));
    let saved = read_response(&mut stdout, 3);
    let text = saved["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Successfully saved 1 file(s)"), "got: {}", text);

    send(serde_json::json!({
        "jsonrpc": "2.0", "id": 4, "method": "tools/call",
        "params": { "name": "save_to_memory", "arguments": { "file_paths": ["/no/such/file.txt"] } }
    }));
    let failed = read_response(&mut stdout, 4);
    assert_eq!(failed["result"]["isError"], true);
    assert_eq!(
        failed["result"]["content"][0]["text"],
        "Error: File not found: /no/such/file.txt"
    );

    send(serde_json::json!({
        "jsonrpc": "2.0", "id": 5, "method": "tools/call",
        "params": { "name": "recall_from_memory", "arguments": { "query": "Rust programming", "k": 1 } }
    }));
    let recalled = read_response(&mut stdout, 5);
    let text = recalled["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("**Result 1**"));
    assert!(text.contains("alpha.md"));

    drop(send);
    drop(stdin);
    let _ = child.wait();
}
