use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::Result;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::{mpsc, Mutex},
};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::frame::Command;
use crate::session::{Message, Session};

type SessionId = u64;

/// The chat broadcast server: a listening endpoint plus the live membership.
pub struct Room {
    listener: TcpListener,
    state: Arc<RoomState>,
}

impl Room {
    pub fn new(listener: TcpListener) -> Self {
        Self {
            listener,
            state: Arc::new(RoomState::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves. The next accept is
    /// armed as soon as the previous one lands; session setup happens on a
    /// spawned task so the listener never stalls.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Room { listener, state } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("room shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &state);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    state: &Arc<RoomState>,
) {
    match result {
        Ok((stream, peer)) => spawn_session(stream, peer, state),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_session(stream: TcpStream, peer: SocketAddr, state: &Arc<RoomState>) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        handle_connection(stream, peer, state).await;
    });
}

/// A member as the rest of the room sees it: the channel broadcasts are
/// queued on. The owning task delivers them to the socket.
struct Member {
    outbox: mpsc::UnboundedSender<Arc<str>>,
}

struct RoomState {
    members: Mutex<HashMap<SessionId, Member>>,
    next_id: AtomicU64,
}

impl RoomState {
    fn new() -> Self {
        Self {
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn insert(&self, id: SessionId, outbox: mpsc::UnboundedSender<Arc<str>>) {
        let mut members = self.members.lock().await;
        members.insert(id, Member { outbox });
    }

    async fn remove(&self, id: SessionId) {
        let mut members = self.members.lock().await;
        members.remove(&id);
    }

    /// Queues one shared line on every member's outbox except the sender's.
    /// The `Arc` keeps the buffer alive until the last delivery finishes.
    async fn broadcast_from(&self, sender: SessionId, line: Arc<str>) {
        let members = self.members.lock().await;
        for (id, member) in members.iter() {
            if *id == sender {
                continue;
            }
            if member.outbox.send(Arc::clone(&line)).is_err() {
                // Recipient is tearing down; its own task handles removal.
                debug!(recipient = id, "dropped broadcast to closing session");
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: Arc<RoomState>) {
    let id = state.next_id();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    state.insert(id, outbox_tx).await;
    debug!(%peer, id, "session opened");

    let mut session = Session::new(Connection::new(stream));
    let result = run_session(&state, id, &mut session, &mut outbox_rx).await;

    // Removal is synchronous with closure, at the one place the session ends.
    state.remove(id).await;
    session.close().await;

    match result {
        Ok(()) => info!(%peer, name = session.name(), "session quit"),
        Err(error) => warn!(%peer, name = session.name(), ?error, "session closed with error"),
    }
}

/// Drives one session: races the next decoded frame against broadcast
/// delivery. The next read is armed only after the previous frame has been
/// fully dispatched, so frames from one peer process strictly in order.
async fn run_session(
    state: &Arc<RoomState>,
    id: SessionId,
    session: &mut Session<TcpStream>,
    outbox: &mut mpsc::UnboundedReceiver<Arc<str>>,
) -> std::io::Result<()> {
    loop {
        select! {
            message = session.read_message() => {
                if !dispatch_command(state, id, session, message?).await {
                    break;
                }
            }
            line = outbox.recv() => {
                match line {
                    Some(line) => session.write_message(line.as_bytes()).await?,
                    None => break,
                }
            }
        }
    }

    Ok(())
}

/// Handles one decoded frame. Returns `false` when the session should end.
async fn dispatch_command(
    state: &RoomState,
    id: SessionId,
    session: &mut Session<TcpStream>,
    message: Message,
) -> bool {
    match message.command {
        Command::Name => {
            // The payload is taken verbatim: no validation, no uniqueness.
            session.set_name(String::from_utf8_lossy(&message.payload).into_owned());
            true
        }
        Command::Chat => {
            let text = String::from_utf8_lossy(&message.payload);
            let line: Arc<str> = Arc::from(format!("{}: {}\n", session.name(), text));
            state.broadcast_from(id, line).await;
            true
        }
        Command::Quit => false,
        Command::Unknown(tag) => {
            warn!(
                tag = %String::from_utf8_lossy(&tag),
                name = session.name(),
                "unknown command"
            );
            true
        }
    }
}
