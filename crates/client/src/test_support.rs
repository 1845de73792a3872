//! Test doubles for the real-time layer.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use servicedesk_shared::{ChannelKey, ClientCommand};

use crate::realtime::{ConnectionState, ControlLink};

/// Recording stand-in for the WebSocket connection. Honors the real link's
/// contract: commands sent while not connected are dropped, not queued.
pub(crate) struct FakeLink {
    state_tx: watch::Sender<ConnectionState>,
    commands: Mutex<Vec<ClientCommand>>,
}

impl FakeLink {
    pub fn connected() -> Arc<Self> {
        Self::with_state(ConnectionState::Connected)
    }

    pub fn with_state(state: ConnectionState) -> Arc<Self> {
        let (state_tx, _) = watch::channel(state);
        Arc::new(Self {
            state_tx,
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn set_state(&self, next: ConnectionState) {
        self.state_tx.send_replace(next);
    }

    pub fn commands(&self) -> Vec<ClientCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn join_count(&self, channel: &ChannelKey) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| matches!(cmd, ClientCommand::JoinChannel { channel: c } if c == channel))
            .count()
    }

    pub fn leave_count(&self, channel: &ChannelKey) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| matches!(cmd, ClientCommand::LeaveChannel { channel: c } if c == channel))
            .count()
    }
}

impl ControlLink for FakeLink {
    fn send(&self, cmd: ClientCommand) {
        if self.state_tx.borrow().is_connected() {
            self.commands.lock().unwrap().push(cmd);
        }
    }

    fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}
