//! Port forwarding into a pod using kube-rs native port-forwarding.
//!
//! A [`ForwardSession`] relays a local TCP port to a port inside the target
//! pod. `start()` returns only once the local listener is bound and the
//! first upgraded stream has been negotiated, so the local port is usable as
//! soon as it returns.
//!
//! The session lifecycle is Idle → Started → Stopped. `stop()` only acts on
//! a Started session, so a signal-driven stop racing a scoped stop releases
//! the relay once. Dropping a session stops it.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use k8s_openapi::api::core::v1::Pod;
use kube::api::Portforwarder;
use kube::{Api, Client};
use serde::Serialize;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::pods::Target;

/// Errors that can occur during port forwarding
#[derive(Error, Debug)]
pub enum PortForwardError {
    #[error("pod {0} is not running, can't port-forward")]
    NotRunning(String),

    #[error("localhost:{0} is in use, can't port-forward to pod")]
    LocalPortInUse(u16),

    #[error("port-forward session was already stopped")]
    AlreadyStopped,

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("port-forward relay exited before becoming ready")]
    ReadyFailed,

    #[error("no stream for remote port {0}")]
    StreamUnavailable(u16),

    #[error("Port forward join error: {0}")]
    JoinError(String),
}

impl PortForwardError {
    /// Check if the session was refused before any tunnel was opened
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PortForwardError::NotRunning(_)
                | PortForwardError::LocalPortInUse(_)
                | PortForwardError::AlreadyStopped
        )
    }
}

const IDLE: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`ForwardSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Started,
    Stopped,
}

impl SessionState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => SessionState::Idle,
            STARTED => SessionState::Started,
            _ => SessionState::Stopped,
        }
    }
}

/// A local ↔ pod TCP relay.
pub struct ForwardSession {
    client: Client,
    target: Target,
    remote_port: u16,
    requested_port: u16,
    local_addr: Option<SocketAddr>,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ForwardSession {
    /// Create an idle session.
    ///
    /// A `local_port` of 0 binds an ephemeral port, readable through
    /// [`ForwardSession::local_port`] once started. `cancel` is usually a
    /// child of the process-wide interrupt token; cancelling it stops the
    /// session.
    pub fn new(
        client: Client,
        target: Target,
        remote_port: u16,
        local_port: u16,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            target,
            remote_port,
            requested_port: local_port,
            local_addr: None,
            state: Arc::new(AtomicU8::new(IDLE)),
            cancel,
            handle: None,
        }
    }

    /// Open the relay and wait until it is ready.
    ///
    /// Calling this on a started session is a no-op. A stopped session,
    /// including one whose start failed, can't be restarted.
    #[instrument(skip(self), fields(pod = %self.target, remote_port = self.remote_port))]
    pub async fn start(&mut self) -> Result<(), PortForwardError> {
        match self.state() {
            SessionState::Started => {
                debug!("Port-forward already started");
                return Ok(());
            }
            SessionState::Stopped => return Err(PortForwardError::AlreadyStopped),
            SessionState::Idle => {}
        }

        if !self.target.running {
            return Err(PortForwardError::NotRunning(self.target.to_string()));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &self.target.namespace);
        let relay = Relay {
            pods,
            pod_name: self.target.name.clone(),
            remote_port: self.remote_port,
            local_port: self.requested_port,
            state: Arc::clone(&self.state),
            cancel: self.cancel.clone(),
        };
        self.handle = Some(tokio::spawn(relay.run(ready_tx)));

        let addr = match ready_rx.await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => return Err(self.fail(e)),
            Err(_) => return Err(self.fail(PortForwardError::ReadyFailed)),
        };

        self.mark_started(addr)
    }

    /// Move a ready session from Idle to Started.
    ///
    /// A token cancelled while the relay was becoming ready leaves the
    /// relay gone, so the session fails instead of reporting ready.
    fn mark_started(&mut self, addr: SocketAddr) -> Result<(), PortForwardError> {
        if self
            .state
            .compare_exchange(IDLE, STARTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
            || self.cancel.is_cancelled()
        {
            return Err(self.fail(PortForwardError::AlreadyStopped));
        }

        self.local_addr = Some(addr);
        info!(
            local_port = addr.port(),
            remote_port = self.remote_port,
            pod = %self.target,
            "Port-forward ready"
        );
        Ok(())
    }

    /// Release the relay. A no-op unless the session is started.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(STARTED, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        debug!(
            pod = %self.target,
            local_port = ?self.local_port(),
            remote_port = self.remote_port,
            "Stopping port-forward"
        );
        self.cancel.cancel();
    }

    /// Current lifecycle state. A started session whose token was
    /// cancelled reads as stopped even before the relay has wound down.
    pub fn state(&self) -> SessionState {
        match SessionState::from_raw(self.state.load(Ordering::SeqCst)) {
            SessionState::Started if self.cancel.is_cancelled() => SessionState::Stopped,
            state => state,
        }
    }

    /// Bound local port, once started.
    pub fn local_port(&self) -> Option<u16> {
        self.local_addr.map(|addr| addr.port())
    }

    /// Bound local address, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Target this session forwards to.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Port inside the pod.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Wait until the session is stopped, by `stop()` or by cancellation.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }

    fn fail(&mut self, error: PortForwardError) -> PortForwardError {
        self.state.store(STOPPED, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        error
    }
}

impl Drop for ForwardSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background relay owned by one session.
struct Relay {
    pods: Api<Pod>,
    pod_name: String,
    remote_port: u16,
    local_port: u16,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
}

type Ready = oneshot::Sender<Result<SocketAddr, PortForwardError>>;

impl Relay {
    async fn run(self, ready: Ready) {
        let (listener, primed) = match self.prepare().await {
            Ok(prepared) => prepared,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                let _ = ready.send(Err(e.into()));
                return;
            }
        };
        if ready.send(Ok(addr)).is_err() {
            return;
        }

        self.accept_loop(listener, primed).await;

        // signal-driven cancellation lands here without going through stop()
        let _ = self
            .state
            .compare_exchange(STARTED, STOPPED, Ordering::SeqCst, Ordering::SeqCst);
        debug!(pod = %self.pod_name, local_port = addr.port(), "Port-forward relay exited");
    }

    /// Bind the local port and negotiate the first upgraded stream.
    async fn prepare(&self) -> Result<(TcpListener, Portforwarder), PortForwardError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, self.local_port))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AddrInUse => PortForwardError::LocalPortInUse(self.local_port),
                _ => PortForwardError::Io(e),
            })?;

        let ports = [self.remote_port];
        let primed = tokio::select! {
            _ = self.cancel.cancelled() => return Err(PortForwardError::AlreadyStopped),
            pf = self.pods.portforward(&self.pod_name, &ports) => pf?,
        };
        Ok((listener, primed))
    }

    async fn accept_loop(&self, listener: TcpListener, primed: Portforwarder) {
        let mut primed = Some(primed);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("Port forward shutdown requested");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            trace!(client_addr = %addr, "New port forward connection");
                            let conn = Connection {
                                pods: self.pods.clone(),
                                pod_name: self.pod_name.clone(),
                                remote_port: self.remote_port,
                                forwarder: primed.take(),
                            };
                            let cancel = self.cancel.child_token();
                            tokio::spawn(async move {
                                tokio::select! {
                                    _ = cancel.cancelled() => {}
                                    result = conn.relay(stream) => {
                                        if let Err(e) = result {
                                            warn!(error = %e, "Port forward connection error");
                                        }
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Port forward accept error");
                        }
                    }
                }
            }
        }
    }
}

/// One accepted local connection.
struct Connection {
    pods: Api<Pod>,
    pod_name: String,
    remote_port: u16,
    forwarder: Option<Portforwarder>,
}

impl Connection {
    async fn relay(self, mut local: TcpStream) -> Result<(), PortForwardError> {
        let mut pf = match self.forwarder {
            Some(pf) => pf,
            None => {
                self.pods
                    .portforward(&self.pod_name, &[self.remote_port])
                    .await?
            }
        };

        let mut upstream = pf
            .take_stream(self.remote_port)
            .ok_or(PortForwardError::StreamUnavailable(self.remote_port))?;

        let (sent, received) = tokio::io::copy_bidirectional(&mut local, &mut upstream).await?;
        trace!(sent, received, "Port forward connection closed");
        drop(upstream);

        pf.join()
            .await
            .map_err(|e| PortForwardError::JoinError(e.to_string()))?;

        Ok(())
    }
}
