//! Isolated invocations of the `cogmeter` binary.
#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use cogmeter::test_utils::TestDir;

/// Environment variables the binary reads that must not leak in from the host.
const HOST_VARS: &[&str] = &[
    "COGMETER_PROVIDERS",
    "COGMETER_FORMAT",
    "COGMETER_TIMEOUT",
    "COGMETER_ACCOUNT",
    "COGMETER_PRETTY",
    "COGMETER_NO_COLOR",
    "COGMETER_LOG",
    "COGMETER_LOG_FORMAT",
    "COGMETER_LOG_FILE",
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "DEEPSEEK_API_KEY",
    "PERPLEXITY_API_KEY",
];

/// A scratch directory holding the config file and ledger for one test.
pub struct CliEnv {
    dir: TestDir,
}

impl CliEnv {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TestDir::new(),
        }
    }

    pub fn write_config(&self, toml: &str) {
        self.dir.create_file("config.toml", toml);
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.file_path("config.toml")
    }

    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.dir.file_path("ledger.sqlite")
    }

    /// The binary with config and ledger pinned to this scratch directory.
    #[allow(deprecated)]
    #[must_use]
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cogmeter").expect("cogmeter binary");
        for var in HOST_VARS {
            cmd.env_remove(var);
        }
        cmd.env("COGMETER_CONFIG", self.config_path())
            .env("COGMETER_LEDGER", self.ledger_path())
            .env("NO_COLOR", "1");
        cmd
    }

    /// Run `credits grant` and assert it succeeded.
    pub fn grant(&self, account: &str, provider: &str, amount: u64) {
        self.cmd()
            .args([
                "credits",
                "grant",
                "--account",
                account,
                "--provider",
                provider,
                "--amount",
                &amount.to_string(),
            ])
            .assert()
            .success();
    }
}

impl Default for CliEnv {
    fn default() -> Self {
        Self::new()
    }
}
