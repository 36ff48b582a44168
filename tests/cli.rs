use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::{tempdir, TempDir};

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Run the binary against an isolated settings file.
fn ctxpack(settings: &TempDir, args: &[&str]) -> Output {
    let settings_file = settings.path().join("settings.json");
    Command::new(env!("CARGO_BIN_EXE_ctxpack"))
        .args(args)
        .arg("--settings")
        .arg(&settings_file)
        .env_remove("CTXPACK_LOG")
        .output()
        .unwrap()
}

fn root_name(dir: &TempDir) -> String {
    dir.path()
        .canonicalize()
        .unwrap()
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[test]
fn cli_extract_tree_and_matching_content() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("README.md"), "# Project\n");
    write_file(&dir.path().join("main.ts"), "console.log('hello');\n");

    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", ".ts"],
    );
    assert!(output.status.success());

    let name = root_name(&dir);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        format!(
            "{name}/\n├── main.ts\n└── README.md\n\n--- {name}/main.ts ---\nconsole.log('hello');\n\n"
        )
    );
}

#[test]
fn cli_extract_json_result() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("sub/c.ts"), "c\n");
    write_file(&dir.path().join("b.ts"), "b\n");
    write_file(&dir.path().join("a.ts"), "a\n");

    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", "ts", "--json"],
    );
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tree = v["tree_text"].as_str().unwrap();
    let sub = tree.find("sub/").unwrap();
    let a = tree.find("a.ts").unwrap();
    let b = tree.find("b.ts").unwrap();
    assert!(sub < a && a < b);

    let labels: Vec<&str> = v["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels.len(), 3);
    assert!(labels[0].ends_with("sub/c.ts"));
    assert!(labels[1].ends_with("/a.ts"));
    assert!(v["token_count"].as_u64().unwrap() > 0);
    assert_eq!(v["truncated"], false);
}

#[test]
fn cli_extract_tree_only() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("main.ts"), "secret body\n");

    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", ".ts", "--tree-only"],
    );
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("main.ts"));
    assert!(!stdout.contains("secret body"));
    assert!(!stdout.contains("---"));
}

#[test]
fn cli_extract_no_matching_files_warns() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("x.ts"), "x\n");
    write_file(&dir.path().join("x.md"), "x\n");

    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", ".py", "--json"],
    );
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["content_text"], "");
    assert_eq!(v["warnings"][0]["kind"], "no_matching_files");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no files match"));
}

#[test]
fn cli_extract_total_budget_truncates() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    for name in ["a.ts", "b.ts", "c.ts"] {
        write_file(&dir.path().join(name), &"z".repeat(100));
    }

    let output = ctxpack(
        &settings,
        &[
            "extract",
            dir.path().to_str().unwrap(),
            "--types",
            ".ts",
            "--max-total-bytes",
            "150",
            "--json",
        ],
    );
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["truncated"], true);
    assert_eq!(v["truncation"]["total_bytes"], true);
    assert_eq!(v["files"].as_array().unwrap().len(), 1);
    assert!(v["content_text"].as_str().unwrap().len() <= 150);
}

#[test]
fn cli_extract_compression_full() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(
        &dir.path().join("lib.js"),
        "/* license */\nconst url = 'http://x.io'; // note\n\n\n\nexport default url;\n",
    );

    let output = ctxpack(
        &settings,
        &[
            "extract",
            dir.path().to_str().unwrap(),
            "--types",
            ".js",
            "--compression",
            "full",
        ],
    );
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("const url = 'http://x.io';\n\nexport default url;\n"));
    assert!(!stdout.contains("license"));
    assert!(!stdout.contains("note"));
}

#[test]
fn cli_extract_missing_path_exit_code() {
    let settings = tempdir().unwrap();
    let output = ctxpack(&settings, &["extract", "/nonexistent/ctxpack/path", "--json"]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).unwrap();
    let last = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(last).unwrap();
    assert!(v["error"].as_str().unwrap().contains("could be resolved"));
}

#[test]
fn cli_extract_invalid_types_exit_code() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", "."],
    );
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(unix)]
#[test]
fn cli_extract_symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("sub/a.ts"), "a\n");
    std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/back")).unwrap();

    let output = ctxpack(
        &settings,
        &["extract", dir.path().to_str().unwrap(), "--types", ".ts", "--json"],
    );
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["files"].as_array().unwrap().len(), 1);
}

#[test]
fn cli_types_persist_and_drive_extract() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("app.py"), "print('py')\n");
    write_file(&dir.path().join("app.rb"), "puts 'rb'\n");

    let output = ctxpack(&settings, &["types", "remove", ".rb"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.lines().any(|l| l == ".rb"));
    assert!(stdout.lines().any(|l| l == ".py"));

    let output = ctxpack(&settings, &["extract", dir.path().to_str().unwrap()]);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("print('py')"));
    assert!(!stdout.contains("puts 'rb'"));

    let output = ctxpack(&settings, &["types", "add", "RB"]);
    assert!(output.status.success());
    let output = ctxpack(&settings, &["types", "list", "--json"]);
    let types: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(types.contains(&".rb".to_string()));
}

#[test]
fn cli_types_detect_save() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    write_file(&dir.path().join("src/main.go"), "package main\n");
    write_file(&dir.path().join("notes.txt"), "n\n");

    let output = ctxpack(
        &settings,
        &["types", "detect", dir.path().to_str().unwrap(), "--save"],
    );
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), ".go\n.txt\n");

    let output = ctxpack(&settings, &["types", "list"]);
    assert_eq!(String::from_utf8(output.stdout).unwrap(), ".go\n.txt\n");
}

#[test]
fn cli_compression_setting_round_trip() {
    let settings = tempdir().unwrap();

    let output = ctxpack(&settings, &["compression"]);
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "none\n");

    let output = ctxpack(&settings, &["compression", "light"]);
    assert!(output.status.success());

    let output = ctxpack(&settings, &["compression"]);
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "light\n");
}

#[test]
fn cli_count_stdin() {
    let settings = tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_ctxpack"))
        .args(["count", "--json", "--settings"])
        .arg(settings.path().join("settings.json"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"hello world")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["chars"], 11);
    assert_eq!(v["tokens"], 4);
}

#[test]
fn cli_count_empty_file() {
    let dir = tempdir().unwrap();
    let settings = tempdir().unwrap();
    let file = dir.path().join("empty.txt");
    write_file(&file, "");

    let output = ctxpack(&settings, &["count", file.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), "chars: 0\ntokens: 0\n");
}

#[test]
fn cli_completions() {
    let settings = tempdir().unwrap();
    let output = ctxpack(&settings, &["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("ctxpack"));
}
