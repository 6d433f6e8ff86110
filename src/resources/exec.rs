//! Command tunnel: runs a shell command line inside a pod container over
//! the Kubernetes exec sub-resource.
//!
//! The remote side is assumed to have the required tools installed; no
//! capability negotiation happens before the command runs.

use std::future::Future;
use std::io::Read;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, AttachedProcess};
use kube::{Api, Client};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::pods::Target;

const INPUT_CHANNEL_CAPACITY: usize = 16;

/// Errors raised while running a command through the tunnel
#[derive(Error, Debug)]
pub enum ExecError {
    /// The exec stream could not be negotiated. Nothing ran.
    #[error("failed to open exec stream to {pod}: {source}")]
    Negotiate {
        pod: String,
        #[source]
        source: kube::Error,
    },

    /// The stream broke after the command started.
    #[error("exec stream to {pod} failed: {message}")]
    Stream {
        pod: String,
        message: String,
        captured: String,
    },

    /// The command ran and reported failure.
    #[error("command in {pod} failed: {message}")]
    Failed {
        pod: String,
        message: String,
        exit_code: Option<i32>,
        captured: String,
    },
}

impl ExecError {
    /// Output captured before the failure, if any.
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            ExecError::Negotiate { .. } => None,
            ExecError::Stream { captured, .. } | ExecError::Failed { captured, .. } => {
                Some(captured.as_str()).filter(|c| !c.is_empty())
            }
        }
    }

    /// Remote exit code, when the command itself failed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Failed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// How stdout and stdin are wired for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Relay stdout live to the local terminal instead of capturing it.
    pub stream_stdout: bool,
    /// Feed the local stdin to the remote shell.
    pub stream_stdin: bool,
}

impl ExecOptions {
    /// Capture stdout, no stdin.
    pub fn captured() -> Self {
        Self::default()
    }

    /// Relay stdout live, optionally wiring stdin for prompts.
    pub fn interactive(stream_stdin: bool) -> Self {
        Self {
            stream_stdout: true,
            stream_stdin,
        }
    }
}

/// Runs command lines inside a target container.
///
/// Returns the captured stdout, or an empty string when stdout was relayed
/// live.
pub trait CommandTunnel: Send + Sync {
    fn execute(
        &self,
        target: &Target,
        command: &str,
        options: ExecOptions,
    ) -> impl Future<Output = Result<String, ExecError>> + Send;
}

/// [`CommandTunnel`] over the pod exec sub-resource.
#[derive(Clone)]
pub struct KubeTunnel {
    client: Client,
}

impl KubeTunnel {
    /// Create a tunnel using the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn attach_params(target: &Target, options: ExecOptions) -> AttachParams {
        // a TTY merges stderr into stdout
        let tty = options.stream_stdin;
        AttachParams {
            container: target.container.clone(),
            stdin: options.stream_stdin,
            stdout: true,
            stderr: !tty,
            tty,
            ..Default::default()
        }
    }
}

impl CommandTunnel for KubeTunnel {
    #[instrument(skip(self, options), fields(pod = %target, container = ?target.container))]
    async fn execute(
        &self,
        target: &Target,
        command: &str,
        options: ExecOptions,
    ) -> Result<String, ExecError> {
        debug!(command, "Executing command");

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let argv = vec!["sh".to_string(), "-c".to_string(), command.to_string()];
        let mut attached = pods
            .exec(&target.name, argv, &Self::attach_params(target, options))
            .await
            .map_err(|source| ExecError::Negotiate {
                pod: target.to_string(),
                source,
            })?;

        let stdin_task = options
            .stream_stdin
            .then(|| attached.stdin())
            .flatten()
            .map(|remote| spawn_input_relay(std::io::stdin(), remote));

        let result = relay(&mut attached, target, options).await;

        if let Some(task) = stdin_task {
            task.abort();
        }

        let joined = attached.join().await;
        match (result, joined) {
            (Ok(captured), Err(e)) => Err(ExecError::Stream {
                pod: target.to_string(),
                message: e.to_string(),
                captured,
            }),
            (result, _) => result,
        }
    }
}

/// Copy a blocking reader, normally the local stdin, into the remote
/// stdin.
///
/// Reads happen on a dedicated thread: a read parked on an idle terminal
/// can't be interrupted, and on tokio's blocking pool it would hold up
/// runtime shutdown until the next line arrives. Aborting the returned
/// task stops the copy; the thread exits after its next read.
pub(crate) fn spawn_input_relay<R, W>(mut reader: R, mut remote: W) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(INPUT_CHANNEL_CAPACITY);

    if let Err(e) = std::thread::Builder::new()
        .name("kuberc-stdin".into())
        .spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => buf.get(..n).unwrap_or_default().to_vec(),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                };
                if tx.blocking_send(chunk).is_err() {
                    break;
                }
            }
        })
    {
        warn!("failed to spawn stdin reader, remote stdin stays closed: {e}");
    }

    tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            if remote.write_all(&chunk).await.is_err() {
                return;
            }
        }
        let _ = remote.shutdown().await;
    })
}

async fn relay(
    attached: &mut AttachedProcess,
    target: &Target,
    options: ExecOptions,
) -> Result<String, ExecError> {
    let status = attached.take_status();
    let stdout = attached.stdout();
    let stderr = attached.stderr();

    let (stdout_result, stderr_result) = tokio::join!(
        drain_stdout(stdout, options.stream_stdout),
        relay_stderr(stderr)
    );

    let (captured, stdout_error) = match stdout_result {
        Ok(captured) => (captured, None),
        Err((captured, e)) => (captured, Some(e)),
    };

    if let Some(e) = stdout_error.or(stderr_result.err()) {
        return Err(ExecError::Stream {
            pod: target.to_string(),
            message: e.to_string(),
            captured,
        });
    }

    let status = match status {
        Some(status) => status.await,
        None => None,
    };
    check_status(target, status, captured)
}

async fn drain_stdout(
    stdout: Option<impl AsyncRead + Unpin>,
    stream: bool,
) -> Result<String, (String, std::io::Error)> {
    let Some(mut stdout) = stdout else {
        return Ok(String::new());
    };

    if stream {
        let mut local = tokio::io::stdout();
        return match tokio::io::copy(&mut stdout, &mut local).await {
            Ok(_) => {
                let _ = local.flush().await;
                Ok(String::new())
            }
            Err(e) => Err((String::new(), e)),
        };
    }

    let mut buf = Vec::new();
    match stdout.read_to_end(&mut buf).await {
        Ok(_) => Ok(String::from_utf8_lossy(&buf).into_owned()),
        Err(e) => Err((String::from_utf8_lossy(&buf).into_owned(), e)),
    }
}

async fn relay_stderr(stderr: Option<impl AsyncRead + Unpin>) -> std::io::Result<()> {
    if let Some(mut stderr) = stderr {
        let mut local = tokio::io::stderr();
        tokio::io::copy(&mut stderr, &mut local).await?;
    }
    Ok(())
}

/// Map the terminal exec status to a result.
///
/// A missing status means the stream closed without one; the captured
/// output is returned as is.
pub(crate) fn check_status(
    target: &Target,
    status: Option<Status>,
    captured: String,
) -> Result<String, ExecError> {
    let Some(status) = status else {
        return Ok(captured);
    };
    if status.status.as_deref() != Some("Failure") {
        return Ok(captured);
    }

    let exit_code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
        })
        .and_then(|c| c.message.as_deref())
        .and_then(|m| m.trim().parse().ok());

    Err(ExecError::Failed {
        pod: target.to_string(),
        message: status
            .message
            .unwrap_or_else(|| "command terminated with a failure status".to_string()),
        exit_code,
        captured,
    })
}
