//! The supervision loop.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use kai_env::{build_env, BuildOptions, Env, RESERVED_PREFIX};
use kai_logstream::{channel_name, logging_name, LineReader, LogStream, OutputStream};
use kai_storage::{Storage, DEFAULT_SCOPES};
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::drift::{drift_targets, poll_drift, Drift};
use crate::error::{Result, SupervisorError};
use crate::files::materialize_files;
use crate::process::{forward_stdin, terminate, SharedStdin};
use crate::state::{RunOutcome, SupervisorState, Termination, TerminationMode};

/// How long publishers may keep draining after the child is gone.
const PUBLISHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervisor settings.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Apps whose entries are composed, in order.
    pub app_names: Vec<String>,
    /// Scopes read for each app.
    pub scopes: Vec<String>,
    /// Composition options.
    pub build: BuildOptions,
    /// Interval between drift checks.
    pub poll_interval: Duration,
    /// Leave `global` out of drift checks.
    pub ignore_global: bool,
    /// Start a fresh child after a drift stop.
    pub restart_on_drift: bool,
    /// How the child is stopped.
    pub termination: TerminationMode,
    /// Decode KFILE contents from base64.
    pub kfile_base64: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            app_names: Vec::new(),
            scopes: DEFAULT_SCOPES.iter().map(ToString::to_string).collect(),
            build: BuildOptions::default(),
            poll_interval: Duration::from_secs(20),
            ignore_global: false,
            restart_on_drift: false,
            termination: TerminationMode::default(),
            kfile_base64: false,
        }
    }
}

/// Why a single run ended.
enum RunEnd {
    Exited(std::io::Result<ExitStatus>),
    Drift(Drift),
    Shutdown,
}

/// Runs one command under secret supervision.
pub struct Supervisor {
    storage: Arc<dyn Storage>,
    logs: Arc<dyn LogStream>,
    config: SupervisorConfig,
    program: String,
    args: Vec<String>,
    base_env: Vec<String>,
    opaque_env: Vec<(OsString, OsString)>,
    stdin: Option<SharedStdin>,
    state: watch::Sender<SupervisorState>,
    shutdown: CancellationToken,
}

/// Environment variables that are not valid UTF-8, handed to the child as-is.
pub type OpaqueEnv = Vec<(OsString, OsString)>;

/// Splits `vars` into `NAME=value` entries for composition and the pairs
/// that are not valid UTF-8.
///
/// Opaque pairs under [`RESERVED_PREFIX`] are dropped like their UTF-8
/// counterparts.
pub fn split_env(vars: impl IntoIterator<Item = (OsString, OsString)>) -> (Vec<String>, OpaqueEnv) {
    let mut text = Vec::new();
    let mut opaque = Vec::new();

    for (name, value) in vars {
        if let (Some(n), Some(v)) = (name.to_str(), value.to_str()) {
            text.push(format!("{n}={v}"));
        } else if name.as_encoded_bytes().starts_with(RESERVED_PREFIX.as_bytes()) {
            debug!(name = %name.to_string_lossy(), "dropping reserved variable");
        } else {
            warn!(
                name = %name.to_string_lossy(),
                "variable is not valid UTF-8, passing it to the child unchanged"
            );
            opaque.push((name, value));
        }
    }

    (text, opaque)
}

/// The current process environment, split by [`split_env`].
#[must_use]
pub fn process_env() -> (Vec<String>, OpaqueEnv) {
    split_env(std::env::vars_os())
}

impl Supervisor {
    /// Creates a supervisor for `command` (program followed by arguments).
    ///
    /// The base environment is the current process environment and the
    /// child's stdin is closed until [`Supervisor::with_stdin`] is used.
    pub fn new(
        storage: Arc<dyn Storage>,
        logs: Arc<dyn LogStream>,
        config: SupervisorConfig,
        command: &[String],
    ) -> Result<Self> {
        let (program, args) = command.split_first().ok_or(SupervisorError::EmptyCommand)?;
        let (state, _) = watch::channel(SupervisorState::Building);
        let (base_env, opaque_env) = process_env();

        Ok(Self {
            storage,
            logs,
            config,
            program: program.clone(),
            args: args.to_vec(),
            base_env,
            opaque_env,
            stdin: None,
            state,
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the environment the composed entries are layered over.
    #[must_use]
    pub fn with_base_env(mut self, base_env: Vec<String>) -> Self {
        self.base_env = base_env;
        self.opaque_env.clear();
        self
    }

    /// Like [`Supervisor::with_base_env`], from raw OS pairs.
    #[must_use]
    pub fn with_os_env(mut self, vars: impl IntoIterator<Item = (OsString, OsString)>) -> Self {
        (self.base_env, self.opaque_env) = split_env(vars);
        self
    }

    /// Forwards `source` to each child's stdin.
    #[must_use]
    pub fn with_stdin(mut self, source: LineReader) -> Self {
        self.stdin = Some(Arc::new(Mutex::new(BufReader::new(source))));
        self
    }

    /// Observes state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Token that stops the child (with the configured termination mode)
    /// and ends [`Supervisor::run`].
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn set_state(&self, state: SupervisorState) {
        info!(state = %state, "supervisor state");
        self.state.send_replace(state);
    }

    /// Runs the command until it exits on its own, is stopped for drift
    /// without `restart_on_drift`, or shutdown is requested.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut restarts = 0;

        loop {
            let (exit_status, termination) = self.run_once().await?;

            let restart = termination == Termination::Drift
                && self.config.restart_on_drift
                && !self.shutdown.is_cancelled();
            if restart {
                restarts += 1;
                self.set_state(SupervisorState::Restarting);
                continue;
            }

            self.set_state(SupervisorState::Done);
            return Ok(RunOutcome {
                exit_status,
                restarts,
                last_termination: termination,
            });
        }
    }

    async fn build(&self) -> Result<Env> {
        self.set_state(SupervisorState::Building);
        let env = build_env(
            &self.config.app_names,
            self.storage.as_ref(),
            &self.base_env,
            &self.config.scopes,
            &self.config.build,
        )
        .await?;
        debug!(vars = env.vars.len(), files = env.files.len(), "environment composed");
        materialize_files(&env, self.config.kfile_base64).await;
        Ok(env)
    }

    fn spawn(&self, env: &Env) -> Result<Child> {
        self.set_state(SupervisorState::Starting);
        info!(command = %self.program, args = ?self.args, "starting command");

        let stdin = if self.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .envs(self.opaque_env.iter().map(|(k, v)| (k, v)))
            .envs(env.pairs())
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                command: self.program.clone(),
                source,
            })
    }

    fn spawn_publisher(
        &self,
        pipe: Option<LineReader>,
        stream: OutputStream,
    ) -> Option<JoinHandle<()>> {
        let pipe = pipe?;
        let logs = Arc::clone(&self.logs);
        let channel = channel_name(&self.config.app_names, stream);
        Some(tokio::spawn(async move {
            if let Err(e) = logs.publish(&channel, pipe).await {
                warn!(channel = %channel, error = %e, "publisher stopped");
            }
        }))
    }

    async fn run_once(&self) -> Result<(Option<ExitStatus>, Termination)> {
        let env = self.build().await?;
        let mut child = self.spawn(&env)?;

        let stop = CancellationToken::new();
        let name = logging_name(&self.config.app_names);
        info!(
            pid = child.id(),
            stdout = %channel_name(&self.config.app_names, OutputStream::Stdout),
            stderr = %channel_name(&self.config.app_names, OutputStream::Stderr),
            "publishing child output"
        );

        let publishers: Vec<JoinHandle<()>> = [
            self.spawn_publisher(
                child.stdout.take().map(|p| Box::new(p) as LineReader),
                OutputStream::Stdout,
            ),
            self.spawn_publisher(
                child.stderr.take().map(|p| Box::new(p) as LineReader),
                OutputStream::Stderr,
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        let forwarder = match (self.stdin.clone(), child.stdin.take()) {
            (Some(source), Some(sink)) => Some(tokio::spawn(forward_stdin(source, sink, stop.clone()))),
            _ => None,
        };

        let heartbeat = {
            let logs = Arc::clone(&self.logs);
            let stop = stop.clone();
            tokio::spawn(async move { logs.heartbeat(&name, stop).await })
        };

        let mut poller = tokio::spawn(poll_drift(
            Arc::clone(&self.storage),
            drift_targets(
                &self.config.app_names,
                &self.config.scopes,
                self.config.ignore_global,
            ),
            self.config.poll_interval,
            stop.clone(),
        ));

        self.set_state(SupervisorState::Running);

        let mut polling = true;
        let end = loop {
            tokio::select! {
                status = child.wait() => break RunEnd::Exited(status),
                joined = &mut poller, if polling => {
                    polling = false;
                    match joined {
                        Ok(Some(drift)) => break RunEnd::Drift(drift),
                        Ok(None) => debug!("drift poller stopped"),
                        Err(e) => error!(
                            error = %e,
                            "drift poller failed, secret changes are no longer detected"
                        ),
                    }
                }
                () = self.shutdown.cancelled() => break RunEnd::Shutdown,
            }
        };

        let (status, termination) = match end {
            RunEnd::Exited(status) => {
                self.set_state(SupervisorState::Exited);
                (status, Termination::Exited)
            }
            RunEnd::Drift(drift) => {
                info!(drift = %drift, "found secrets updated, stopping process");
                self.set_state(SupervisorState::Killed);
                (terminate(&mut child, self.config.termination).await, Termination::Drift)
            }
            RunEnd::Shutdown => {
                info!("shutdown requested, stopping process");
                self.set_state(SupervisorState::Killed);
                (terminate(&mut child, self.config.termination).await, Termination::Shutdown)
            }
        };

        stop.cancel();
        self.teardown(publishers, forwarder, heartbeat, poller).await;

        let status = status?;
        info!(status = %status, termination = %termination, "process stopped");
        Ok((Some(status), termination))
    }

    async fn teardown(
        &self,
        publishers: Vec<JoinHandle<()>>,
        forwarder: Option<JoinHandle<()>>,
        heartbeat: JoinHandle<kai_logstream::Result<()>>,
        poller: JoinHandle<Option<Drift>>,
    ) {
        if let Some(forwarder) = forwarder {
            if let Err(e) = forwarder.await {
                warn!(error = %e, "stdin forwarder failed");
            }
        }

        match heartbeat.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to clear heartbeat"),
            Err(e) => warn!(error = %e, "heartbeat task failed"),
        }

        if !poller.is_finished() {
            let _ = poller.await;
        }

        for publisher in publishers {
            let abort = publisher.abort_handle();
            match tokio::time::timeout(PUBLISHER_DRAIN_TIMEOUT, publisher).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "publisher task failed"),
                Err(_) => {
                    warn!("output still open after the child stopped, abandoning publisher");
                    abort.abort();
                }
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
