//! `execute_code` backend: run a Python script inside a throwaway virtual
//! environment.
//!
//! Every call gets a fresh temp dir holding `venv/` and `script.py`; the dir
//! is removed when the call returns, whatever the outcome. A failure caused
//! by a missing module triggers one `pip install` of that module and exactly
//! one retry.
//!
//! The result is always a human-readable log, never an error.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tc_domain::config::SandboxConfig;
use tc_domain::error::{Error, Result};
use tc_domain::trace::TraceEvent;
use tokio::process::Command;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interpreter seam
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provisioned environment inside a sandbox working directory.
#[derive(Debug, Clone)]
pub struct Environment {
    pub root: PathBuf,
    pub python: PathBuf,
}

/// Captured result of one child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// The process-level operations the sandbox needs.
///
/// `Err` means the operation could not be carried out at all (spawn failure,
/// missing interpreter). A script that ran and failed is `Ok` with
/// `success == false`.
#[async_trait::async_trait]
pub trait Interpreter: Send + Sync {
    async fn provision(&self, workdir: &Path) -> Result<Environment>;
    async fn execute(&self, env: &Environment, script: &Path) -> Result<ExecOutcome>;
    async fn install(&self, env: &Environment, package: &str) -> Result<ExecOutcome>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Python venv interpreter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PythonVenv {
    cfg: SandboxConfig,
}

impl PythonVenv {
    pub fn new(cfg: SandboxConfig) -> Self {
        Self { cfg }
    }
}

fn venv_python(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts").join("python.exe")
    } else {
        venv.join("bin").join("python")
    }
}

/// Run a command to completion, killing it if it outlives `timeout_sec`
/// (0 = no limit). A timeout is reported as a failed outcome.
async fn run_command(mut cmd: Command, timeout_sec: u64) -> Result<ExecOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;
    let output = if timeout_sec == 0 {
        child.wait_with_output().await?
    } else {
        match tokio::time::timeout(Duration::from_secs(timeout_sec), child.wait_with_output())
            .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Ok(ExecOutcome::failed(format!(
                    "process timed out after {timeout_sec} seconds and was killed"
                )))
            }
        }
    };

    Ok(ExecOutcome {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[async_trait::async_trait]
impl Interpreter for PythonVenv {
    async fn provision(&self, workdir: &Path) -> Result<Environment> {
        let venv = workdir.join("venv");
        let mut cmd = Command::new(&self.cfg.python);
        cmd.arg("-m").arg("venv").arg(&venv);
        let outcome = run_command(cmd, self.cfg.install_timeout_sec)
            .await
            .map_err(|e| Error::Sandbox(format!("failed to run {}: {e}", self.cfg.python)))?;
        if !outcome.success {
            return Err(Error::Sandbox(format!(
                "creating virtual environment failed: {}",
                outcome.stderr.trim()
            )));
        }
        Ok(Environment {
            python: venv_python(&venv),
            root: workdir.to_path_buf(),
        })
    }

    async fn execute(&self, env: &Environment, script: &Path) -> Result<ExecOutcome> {
        let mut cmd = Command::new(&env.python);
        cmd.arg(script).current_dir(&env.root);
        run_command(cmd, self.cfg.timeout_sec).await
    }

    async fn install(&self, env: &Environment, package: &str) -> Result<ExecOutcome> {
        let mut cmd = Command::new(&env.python);
        cmd.args(["-m", "pip", "install", package, "--no-user", "--disable-pip-version-check"])
            .current_dir(&env.root);
        run_command(cmd, self.cfg.install_timeout_sec).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sandbox
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Success,
    InstalledThenSuccess,
    InstallFailed,
    RetryFailed,
    UnknownModule,
    Failed,
}

impl RunOutcome {
    fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::InstalledThenSuccess => "installed_then_success",
            RunOutcome::InstallFailed => "install_failed",
            RunOutcome::RetryFailed => "retry_failed",
            RunOutcome::UnknownModule => "unknown_module",
            RunOutcome::Failed => "failed",
        }
    }

    fn install_attempted(self) -> bool {
        matches!(
            self,
            RunOutcome::InstalledThenSuccess | RunOutcome::InstallFailed | RunOutcome::RetryFailed
        )
    }
}

pub struct Sandbox {
    interpreter: Box<dyn Interpreter>,
}

impl Sandbox {
    pub fn new(cfg: SandboxConfig) -> Self {
        Self::with_interpreter(Box::new(PythonVenv::new(cfg)))
    }

    pub fn with_interpreter(interpreter: Box<dyn Interpreter>) -> Self {
        Self { interpreter }
    }

    /// Run `code` and return the execution log, one entry per line.
    pub async fn run(&self, code: &str) -> String {
        let start = Instant::now();
        let mut logs = Vec::new();
        let result = self.run_inner(code, &mut logs).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => {
                TraceEvent::SandboxFinished {
                    outcome: outcome.as_str().into(),
                    install_attempted: outcome.install_attempted(),
                    duration_ms,
                }
                .emit();
                logs.join("\n")
            }
            Err(e) => {
                tracing::warn!(error = %e, "sandbox run aborted");
                TraceEvent::SandboxFinished {
                    outcome: "unexpected_error".into(),
                    install_attempted: false,
                    duration_ms,
                }
                .emit();
                format!("Unexpected error: {e}")
            }
        }
    }

    async fn run_inner(&self, code: &str, logs: &mut Vec<String>) -> Result<RunOutcome> {
        let workdir = tempfile::Builder::new().prefix("toolchat-sandbox-").tempdir()?;

        let env = self.interpreter.provision(workdir.path()).await?;
        logs.push("Virtual environment set up.".into());

        let script = workdir.path().join("script.py");
        tokio::fs::write(&script, code).await?;

        let first = self.interpreter.execute(&env, &script).await?;
        if first.success {
            push_success(logs, &first);
            return Ok(RunOutcome::Success);
        }

        if !is_missing_module(&first.stderr) {
            logs.push(format!("Error executing code: {}", first.stderr));
            return Ok(RunOutcome::Failed);
        }

        let Some(module) = extract_missing_module(&first.stderr) else {
            logs.push(format!(
                "Error: Unable to extract module name from error: {}",
                first.stderr
            ));
            return Ok(RunOutcome::UnknownModule);
        };

        logs.push(format!("Installing missing module: {module}..."));
        let install = self.interpreter.install(&env, install_target(&module)).await?;
        if !install.success {
            tracing::debug!(module = %module, stderr = %install.stderr, "pip install failed");
            logs.push(format!("Error installing package: {module}"));
            return Ok(RunOutcome::InstallFailed);
        }
        logs.push(format!("Module {module} installed successfully."));

        let retry = self.interpreter.execute(&env, &script).await?;
        if retry.success {
            push_success(logs, &retry);
            Ok(RunOutcome::InstalledThenSuccess)
        } else {
            logs.push(format!(
                "Error executing code after installing {module}: {}",
                retry.stderr
            ));
            Ok(RunOutcome::RetryFailed)
        }
    }
}

fn push_success(logs: &mut Vec<String>, outcome: &ExecOutcome) {
    logs.push("Python code executed successfully.".into());
    logs.push(format!("Execution output:\n\n{}", outcome.stdout));
}

const MISSING_MODULE_MARKER: &str = "No module named";

fn is_missing_module(stderr: &str) -> bool {
    stderr.contains("ModuleNotFoundError") || stderr.contains(MISSING_MODULE_MARKER)
}

/// Pull the quoted module name out of a `No module named 'x'` message.
pub fn extract_missing_module(stderr: &str) -> Option<String> {
    let idx = stderr.find(MISSING_MODULE_MARKER)?;
    let rest = &stderr[idx + MISSING_MODULE_MARKER.len()..];
    let start = rest.find('\'')? + 1;
    let len = rest[start..].find('\'')?;
    let name = rest[start..start + len].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// `pip` installs distributions, so `a.b.c` is installed as `a`.
fn install_target(module: &str) -> &str {
    module.split('.').next().unwrap_or(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted interpreter: pops one outcome per call.
    #[derive(Default)]
    struct FakeInterpreter {
        provision_error: bool,
        executions: Mutex<VecDeque<ExecOutcome>>,
        installs: Mutex<VecDeque<ExecOutcome>>,
        calls: Mutex<Vec<String>>,
        seen_scripts: Mutex<Vec<String>>,
    }

    impl FakeInterpreter {
        fn new(executions: Vec<ExecOutcome>, installs: Vec<ExecOutcome>) -> Self {
            Self {
                executions: Mutex::new(executions.into()),
                installs: Mutex::new(installs.into()),
                ..Default::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl Interpreter for std::sync::Arc<FakeInterpreter> {
        async fn provision(&self, workdir: &Path) -> Result<Environment> {
            self.calls.lock().unwrap().push("provision".into());
            if self.provision_error {
                return Err(Error::Sandbox("python3 not found".into()));
            }
            Ok(Environment {
                root: workdir.to_path_buf(),
                python: workdir.join("venv/bin/python"),
            })
        }

        async fn execute(&self, _env: &Environment, script: &Path) -> Result<ExecOutcome> {
            self.calls.lock().unwrap().push("execute".into());
            let body = std::fs::read_to_string(script).unwrap();
            self.seen_scripts.lock().unwrap().push(body);
            Ok(self.executions.lock().unwrap().pop_front().unwrap())
        }

        async fn install(&self, _env: &Environment, package: &str) -> Result<ExecOutcome> {
            self.calls.lock().unwrap().push(format!("install {package}"));
            Ok(self.installs.lock().unwrap().pop_front().unwrap())
        }
    }

    fn sandbox(fake: &std::sync::Arc<FakeInterpreter>) -> Sandbox {
        Sandbox::with_interpreter(Box::new(fake.clone()))
    }

    const MISSING_NUMPY: &str = concat!(
        "Traceback (most recent call last):\n",
        "  File \"script.py\", line 1, in <module>\n",
        "    import numpy\n",
        "ModuleNotFoundError: No module named 'numpy'\n",
    );

    #[tokio::test]
    async fn success_logs_output() {
        let fake = std::sync::Arc::new(FakeInterpreter::new(vec![ExecOutcome::ok("4\n")], vec![]));
        let log = sandbox(&fake).run("print(2+2)").await;
        assert_eq!(
            log,
            concat!(
                "Virtual environment set up.\n",
                "Python code executed successfully.\n",
                "Execution output:\n\n4\n",
            )
        );
        assert_eq!(fake.seen_scripts.lock().unwrap()[0], "print(2+2)");
    }

    #[tokio::test]
    async fn plain_failure_is_reported_without_install() {
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![ExecOutcome::failed("ZeroDivisionError: division by zero")],
            vec![],
        ));
        let log = sandbox(&fake).run("1/0").await;
        assert!(log.ends_with("Error executing code: ZeroDivisionError: division by zero"));
        assert_eq!(*fake.calls.lock().unwrap(), vec!["provision", "execute"]);
    }

    #[tokio::test]
    async fn missing_module_installed_and_retried_once() {
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![ExecOutcome::failed(MISSING_NUMPY), ExecOutcome::ok("[1 2]\n")],
            vec![ExecOutcome::ok("Successfully installed numpy")],
        ));
        let log = sandbox(&fake).run("import numpy").await;
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines[0], "Virtual environment set up.");
        assert_eq!(lines[1], "Installing missing module: numpy...");
        assert_eq!(lines[2], "Module numpy installed successfully.");
        assert_eq!(lines[3], "Python code executed successfully.");
        assert!(log.ends_with("Execution output:\n\n[1 2]\n"));
        assert_eq!(
            *fake.calls.lock().unwrap(),
            vec!["provision", "execute", "install numpy", "execute"]
        );
    }

    #[tokio::test]
    async fn failed_install_stops_without_retry() {
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![ExecOutcome::failed(MISSING_NUMPY)],
            vec![ExecOutcome::failed("No matching distribution")],
        ));
        let log = sandbox(&fake).run("import numpy").await;
        assert!(log.ends_with("Error installing package: numpy"));
        assert_eq!(fake.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn second_failure_is_not_retried_again() {
        let other_missing = "ModuleNotFoundError: No module named 'scipy'";
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![ExecOutcome::failed(MISSING_NUMPY), ExecOutcome::failed(other_missing)],
            vec![ExecOutcome::ok("")],
        ));
        let log = sandbox(&fake).run("import numpy, scipy").await;
        assert!(log.ends_with(&format!(
            "Error executing code after installing numpy: {other_missing}"
        )));
        assert_eq!(fake.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn submodule_installs_top_level_package() {
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![
                ExecOutcome::failed("ModuleNotFoundError: No module named 'google.protobuf'"),
                ExecOutcome::ok(""),
            ],
            vec![ExecOutcome::ok("")],
        ));
        let log = sandbox(&fake).run("import google.protobuf").await;
        assert!(log.contains("Installing missing module: google.protobuf..."));
        assert!(fake.calls.lock().unwrap().contains(&"install google".to_string()));
    }

    #[tokio::test]
    async fn unparseable_module_name() {
        let stderr = "ModuleNotFoundError: something odd";
        let fake = std::sync::Arc::new(FakeInterpreter::new(
            vec![ExecOutcome::failed(stderr)],
            vec![],
        ));
        let log = sandbox(&fake).run("import ???").await;
        let expected = format!("Error: Unable to extract module name from error: {stderr}");
        assert!(log.ends_with(&expected));
    }

    #[tokio::test]
    async fn provisioning_error_is_unexpected() {
        let fake = std::sync::Arc::new(FakeInterpreter {
            provision_error: true,
            ..Default::default()
        });
        let log = sandbox(&fake).run("print(1)").await;
        assert_eq!(log, "Unexpected error: sandbox: python3 not found");
    }

    #[test]
    fn extracts_module_after_marker() {
        assert_eq!(extract_missing_module(MISSING_NUMPY).as_deref(), Some("numpy"));
        assert_eq!(
            extract_missing_module("File 'x.py'\nNo module named 'yaml'").as_deref(),
            Some("yaml")
        );
        assert_eq!(extract_missing_module("No module named ''"), None);
        assert_eq!(extract_missing_module("ImportError: cannot import name 'x'"), None);
    }

    #[tokio::test]
    async fn run_command_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let outcome = run_command(cmd, 1).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("timed out"));
    }
}
