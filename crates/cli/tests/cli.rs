use assert_cmd::Command;
use tempfile::TempDir;

const BOOKSHELF_VARS: &[&str] = &[
    "BOOKSHELF_ENV",
    "BOOKSHELF_CONFIG_DIR",
    "BOOKSHELF_DATABASE__ENDPOINT",
    "BOOKSHELF_DATABASE__PASSWORD",
    "BOOKSHELF_DATABASE__USERNAME",
    "BOOKSHELF_DATABASE__COLLECTION",
];

fn bookshelf(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bookshelf-cli").unwrap();
    cmd.current_dir(workdir.path()).env_remove("RUST_LOG");
    for var in BOOKSHELF_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn config_prints_layered_settings() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("base.toml"),
        "[database]\ncollection = \"novels\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("staging.toml"),
        "[server]\nport = 9090\n",
    )
    .unwrap();

    let stdout = stdout_of(
        bookshelf(&dir)
            .arg("--config-dir")
            .arg(dir.path())
            .args(["--env", "staging", "config"]),
    );

    let settings: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(settings["environment"], "staging");
    assert_eq!(settings["database"]["collection"], "novels");
    assert_eq!(settings["server"]["port"], 9090);
}

#[test]
fn config_redacts_the_database_password() {
    let dir = TempDir::new().unwrap();
    let stdout = stdout_of(
        bookshelf(&dir)
            .env("BOOKSHELF_DATABASE__USERNAME", "root")
            .env("BOOKSHELF_DATABASE__PASSWORD", "hunter2")
            .arg("config"),
    );

    assert!(stdout.contains("***"));
    assert!(!stdout.contains("hunter2"));
}

#[test]
fn unknown_environment_fails() {
    let dir = TempDir::new().unwrap();
    let output = bookshelf(&dir)
        .args(["--env", "moon", "config"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();

    assert!(String::from_utf8(output)
        .unwrap()
        .contains("unsupported environment 'moon'"));
}

#[test]
fn ping_reaches_an_in_memory_database() {
    let dir = TempDir::new().unwrap();
    let stdout = stdout_of(
        bookshelf(&dir)
            .env("BOOKSHELF_DATABASE__ENDPOINT", "mem://")
            .arg("ping"),
    );

    assert!(stdout.contains("database reachable at mem://"));
}
