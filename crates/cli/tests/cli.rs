use assert_cmd::Command;
use tempfile::TempDir;

/// Runs in an empty directory so no `.env` from the checkout leaks in.
fn cli(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shelf-cli").unwrap();
    cmd.current_dir(workdir.path())
        .env_clear()
        .env("SHELF_CONFIG_DIR", "/nonexistent/shelf-config")
        .env("RUST_LOG", "off");
    cmd
}

fn configured(workdir: &TempDir) -> Command {
    let mut cmd = cli(workdir);
    cmd.env("SUPABASE_URL", "https://project.example.co")
        .env("SUPABASE_ANON_KEY", "anon-key")
        .env("SUPABASE_JWT_SECRET", "cli-secret");
    cmd
}

#[test]
fn check_config_fails_without_platform_variables() {
    let workdir = TempDir::new().unwrap();
    cli(&workdir).arg("check-config").assert().failure();
}

#[test]
fn check_config_succeeds_when_configured() {
    let workdir = TempDir::new().unwrap();
    configured(&workdir).arg("check-config").assert().success();
}

#[test]
fn mint_token_prints_a_jwt() {
    let workdir = TempDir::new().unwrap();
    let output = configured(&workdir)
        .args(["mint-token", "--user-id", "alice"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let token = String::from_utf8(output).unwrap();
    assert_eq!(token.trim().split('.').count(), 3);
}

#[test]
fn dotenv_file_in_working_directory_is_loaded() {
    let workdir = TempDir::new().unwrap();
    std::fs::write(
        workdir.path().join(".env"),
        "SUPABASE_URL=https://project.example.co\nSUPABASE_ANON_KEY=anon-key\nSUPABASE_JWT_SECRET=dotenv-secret\n",
    )
    .unwrap();

    cli(&workdir).arg("check-config").assert().success();
}
