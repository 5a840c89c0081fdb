//! End-to-end tests for the `cogmeter` binary.
//!
//! Each test runs the real binary against a scratch config and ledger. The
//! analyze tests point every provider at a wiremock server.

mod common;

use cogmeter::test_utils::{make_test_config_toml, strip_ansi_codes};
use common::cli::CliEnv;
use common::logger::TestLogger;
use predicates::prelude::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCOUNT: &str = "test-acct";
const TEXT: &str = "When a plan fails I write down what I expected and what happened instead.";

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| panic!("invalid JSON ({e}): {stdout}"))
}

async fn mock_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "Reflective and evidence-driven.",
            "sections": [{"title": "Reasoning Style", "body": "Compares predictions to results."}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/anthropic"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;
    server
}

fn configured_env(server: &MockServer) -> CliEnv {
    let env = CliEnv::new();
    env.write_config(&make_test_config_toml(&server.uri(), &env.ledger_path()));
    env
}

fn balance_of(env: &CliEnv, provider: &str) -> u64 {
    let output = env
        .cmd()
        .args(["credits", "balance", "--account", ACCOUNT, "--provider", provider, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    json["data"]["balances"][0]["balance"].as_u64().unwrap()
}

// =============================================================================
// Help and usage
// =============================================================================

#[test]
fn help_lists_commands() {
    CliEnv::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("credits"))
        .stdout(predicate::str::contains("costs"));
}

#[test]
fn no_command_prints_quickstart() {
    CliEnv::new()
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

#[test]
fn unknown_provider_is_a_config_error() {
    CliEnv::new()
        .cmd()
        .args(["analyze", "--text", TEXT, "--provider", "bogus"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bogus"));
}

#[test]
fn unknown_kind_is_a_config_error() {
    CliEnv::new()
        .cmd()
        .args(["analyze", "--text", TEXT, "--kind", "astrological", "--provider", "openai"])
        .assert()
        .code(2);
}

#[test]
fn invalid_config_file_is_reported() {
    let env = CliEnv::new();
    env.write_config("[general\ntimeout_seconds = ");
    env.cmd().args(["costs"]).assert().code(2);
}

// =============================================================================
// Credits
// =============================================================================

#[test]
fn grant_then_balance_and_journal() {
    let log = TestLogger::new("grant_then_balance_and_journal");
    let env = CliEnv::new();

    log.phase("grant");
    env.grant(ACCOUNT, "openai", 250);
    env.grant(ACCOUNT, "openai", 50);

    log.phase("balance");
    assert_eq!(balance_of(&env, "openai"), 300);

    let output = env
        .cmd()
        .args(["credits", "balance", "--account", ACCOUNT])
        .output()
        .unwrap();
    let human = strip_ansi_codes(&String::from_utf8_lossy(&output.stdout));
    assert!(human.contains("OpenAI"), "{human}");
    assert!(human.contains("300"), "{human}");

    log.phase("journal");
    let output = env
        .cmd()
        .args(["credits", "journal", "--account", ACCOUNT, "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["command"], "credits.journal");
    let entries = json["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["delta"], 50);
    assert_eq!(entries[0]["balanceAfter"], 300);
    log.finish_ok();
}

#[test]
fn zero_grant_is_rejected() {
    CliEnv::new()
        .cmd()
        .args(["credits", "grant", "--account", ACCOUNT, "--provider", "openai", "--amount", "0"])
        .assert()
        .code(3);
}

#[test]
fn unfunded_balance_reads_zero() {
    let env = CliEnv::new();
    assert_eq!(balance_of(&env, "perplexity"), 0);
}

// =============================================================================
// Costs
// =============================================================================

#[test]
fn costs_json_lists_schedule() {
    let env = CliEnv::new();
    env.write_config("[costs]\ncognitive = 120\n\n[costs.overrides.perplexity]\ncognitive = 300\n");

    let output = env.cmd().args(["costs", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["command"], "costs");

    let rows = json["data"].as_array().unwrap();
    let cost_of = |provider: &str| {
        rows.iter()
            .find(|r| r["provider"] == provider && r["kind"] == "cognitive")
            .map(|r| (r["cost"].as_u64().unwrap(), r["overridden"].as_bool().unwrap()))
            .unwrap()
    };
    assert_eq!(cost_of("openai"), (120, false));
    assert_eq!(cost_of("perplexity"), (300, true));
}

// =============================================================================
// Analyze
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn analyze_charges_successful_provider() {
    let log = TestLogger::new("analyze_charges_successful_provider");
    let server = mock_backend().await;
    let env = configured_env(&server);
    env.grant(ACCOUNT, "openai", 500);

    log.phase("analyze");
    let output = env
        .cmd()
        .env("COGMETER_TEST_KEY", "sk-test")
        .args(["analyze", "--text", TEXT, "--provider", "openai", "--quiet", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json = stdout_json(&output);
    assert_eq!(json["command"], "analyze");
    let outcome = &json["data"]["outcomes"]["openai"];
    assert_eq!(outcome["status"], "success");
    assert_eq!(outcome["payload"]["summary"], "Reflective and evidence-driven.");
    assert!(json["errors"].as_array().unwrap().is_empty());

    log.phase("verify balance");
    assert_eq!(balance_of(&env, "openai"), 400);
    log.finish_ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_with_every_provider_failing_exits_5() {
    let server = mock_backend().await;
    let env = configured_env(&server);
    env.grant(ACCOUNT, "anthropic", 500);

    env.cmd()
        .args(["analyze", "--text", TEXT, "--provider", "anthropic", "--quiet"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("failed: unavailable"));

    assert_eq!(balance_of(&env, "anthropic"), 500);
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_without_credit_shows_preview() {
    let server = mock_backend().await;
    let env = configured_env(&server);
    env.grant(ACCOUNT, "openai", 500);

    let output = env
        .cmd()
        .args([
            "analyze",
            "--text",
            TEXT,
            "--provider",
            "openai,deepseek",
            "--quiet",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = strip_ansi_codes(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.contains("DeepSeek · preview"), "{stdout}");
    assert!(stdout.contains("Needs 100 credits, 0 available."), "{stdout}");
    assert!(stdout.contains("1 succeeded, 0 failed, 1 skipped"), "{stdout}");

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/deepseek"));
    assert_eq!(balance_of(&env, "deepseek"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn analyze_reads_text_from_stdin() {
    let server = mock_backend().await;
    let env = configured_env(&server);
    env.grant(ACCOUNT, "openai", 100);

    env.cmd()
        .args(["analyze", "--provider", "openai", "--quiet", "--json"])
        .write_stdin(TEXT)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\":\"success\""));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["text"], TEXT);
}

#[test]
fn analyze_rejects_empty_stdin() {
    let env = CliEnv::new();
    env.cmd()
        .args(["analyze", "--provider", "openai", "--quiet"])
        .write_stdin("   \n")
        .assert()
        .code(3);
}
