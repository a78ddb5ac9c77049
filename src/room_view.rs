//! Room view controller.
//!
//! ## Lifecycle
//! 1. Initializing: a username (from the session) and a room id are required,
//!    otherwise the username is cleared and the client goes back to landing.
//! 2. Synchronizing: reconcile joined rooms with the server, draw the room
//!    list, replay this room's history without writing it again.
//! 3. Connected: subscribe to every channel event and open the socket.
//! 4. Disconnected (socket dropped, no reconnect) or NavigatingAway.
//!
//! Channel listeners only forward into an mpsc queue; all state changes
//! happen on the controller's own task inside [`RoomView::run`].

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::channel::{RealtimeChannel, Subscription};
use crate::history::MessageLog;
use crate::message::{ChannelEvent, ChatEvent, EventKind};
use crate::rooms::{GreetedRooms, LeaveOutcome, RoomApi, RoomRegistry};
use crate::storage::{SharedStorage, USERNAME_KEY};
use crate::typing::TypingIndicator;
use crate::view::{Line, View};
use crate::Navigation;

/// Author of locally generated status records.
pub const SYSTEM_USER: &str = "Sistema";

const DISCONNECTED_TEXT: &str = "Você foi desconectado.";
const CONNECTION_ERROR_TEXT: &str = "Ocorreu um erro de conexão.";
const ROOM_NOT_FOUND_ALERT: &str = "Erro: Sala não encontrada.";
const SERVER_UNREACHABLE_ALERT: &str = "Não foi possível conectar ao servidor.";
const CREATE_FAILED_ALERT: &str = "Não foi possível criar a sala.";

pub const HELP_TEXT: &str = "\
comandos:
  <texto>         enviar mensagem
  /join <código>  entrar noutra sala
  /create         criar uma sala nova
  /switch <id>    ir para uma sala da lista
  /remove <id>    remover uma sala da lista
  /rooms          mostrar a lista de salas
  /leave          sair e voltar ao início
  /help           esta ajuda";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Initializing,
    Synchronizing,
    Connected,
    Disconnected,
    NavigatingAway,
}

/// A line typed in the room view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCommand {
    Say(String),
    Join(String),
    Create,
    Switch(String),
    Remove(String),
    Rooms,
    Leave,
    Help,
    Unknown(String),
}

impl RoomCommand {
    pub fn parse(line: &str) -> RoomCommand {
        let line = line.trim_end_matches(['\r', '\n']);
        let Some(rest) = line.strip_prefix('/') else {
            return RoomCommand::Say(line.to_string());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim().to_string()),
            None => (rest.trim(), String::new()),
        };
        match name {
            "join" | "j" => RoomCommand::Join(arg),
            "create" | "new" => RoomCommand::Create,
            "switch" | "s" => RoomCommand::Switch(arg),
            "remove" | "rm" => RoomCommand::Remove(arg),
            "rooms" => RoomCommand::Rooms,
            "leave" | "quit" => RoomCommand::Leave,
            "help" | "?" => RoomCommand::Help,
            other => RoomCommand::Unknown(other.to_string()),
        }
    }
}

pub struct RoomView<A, V> {
    room_id: String,
    username: String,
    storage: SharedStorage,
    registry: RoomRegistry<A>,
    log: MessageLog,
    greeted: GreetedRooms,
    channel: RealtimeChannel,
    view: V,
    typing: TypingIndicator,
    joined: Vec<String>,
    state: RoomState,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    subscriptions: Vec<Subscription>,
}

impl<A: RoomApi, V: View> RoomView<A, V> {
    /// Build the view for `room_id`.
    ///
    /// Without a stored username or with an empty room id, the username is
    /// removed from the session and the landing page is returned instead.
    pub fn open(
        room_id: &str,
        api: A,
        storage: SharedStorage,
        channel: RealtimeChannel,
        view: V,
        typing_timeout: Duration,
    ) -> Result<Self, Navigation> {
        let room_id = room_id.trim();
        let username = storage
            .get_item(USERNAME_KEY)
            .map(|u| u.trim().to_string())
            .unwrap_or_default();
        if username.is_empty() || room_id.is_empty() {
            info!(room = room_id, "missing username or room, back to landing");
            storage.remove_item(USERNAME_KEY);
            return Err(Navigation::Landing);
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            room_id: room_id.to_string(),
            username,
            registry: RoomRegistry::new(api, storage.clone()),
            log: MessageLog::new(storage.clone()),
            greeted: GreetedRooms::new(storage.clone()),
            storage,
            channel,
            view,
            typing: TypingIndicator::new(typing_timeout),
            joined: Vec::new(),
            state: RoomState::Initializing,
            events_tx,
            events_rx,
            subscriptions: Vec::new(),
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn state(&self) -> RoomState {
        self.state
    }

    pub fn joined_rooms(&self) -> &[String] {
        &self.joined
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Reconcile the room list with the server and replay history.
    pub async fn synchronize(&mut self) {
        self.state = RoomState::Synchronizing;
        self.joined = self.registry.synchronize(&self.room_id).await;
        self.view.render_rooms(&self.joined, &self.room_id);
        for record in self.log.list(&self.room_id) {
            self.add_message(&record, false);
        }
    }

    /// Subscribe to every channel event and open the socket.
    pub fn connect(&mut self) {
        self.subscriptions = EventKind::ALL
            .iter()
            .map(|&kind| {
                let tx = self.events_tx.clone();
                self.channel.on(kind, move |event| {
                    let _ = tx.send(event.clone());
                })
            })
            .collect();

        match self.channel.connect(&self.room_id, &self.username) {
            Ok(()) => self.state = RoomState::Connected,
            Err(e) => {
                warn!(error = %e, "could not open room socket");
                self.handle_event(ChannelEvent::Error(e.to_string()), Instant::now());
            }
        }
    }

    /// Apply one channel event.
    pub fn handle_event(&mut self, event: ChannelEvent, now: Instant) {
        match event {
            ChannelEvent::Message(ChatEvent::Typing { user }) => {
                if user != self.username {
                    let text = self.typing.show(&user, now);
                    self.view.set_typing(Some(text));
                }
            }
            ChannelEvent::Message(msg @ ChatEvent::Chat { .. }) => {
                if msg.user() != self.username {
                    self.typing.clear();
                    self.view.set_typing(None);
                    self.add_message(&msg, true);
                }
            }
            ChannelEvent::Message(msg @ ChatEvent::UserJoined { .. }) => {
                if msg.user() != self.username || self.greeted.first_greeting(&self.room_id) {
                    self.add_message(&msg, true);
                }
            }
            ChannelEvent::Message(msg @ ChatEvent::UserLeft { .. }) => {
                self.add_message(&msg, true);
            }
            ChannelEvent::Closed => {
                self.state = RoomState::Disconnected;
                self.add_message(&system_record(DISCONNECTED_TEXT), true);
            }
            ChannelEvent::Error(detail) => {
                warn!(room = %self.room_id, %detail, "room socket error");
                self.state = RoomState::Disconnected;
                self.add_message(&system_record(CONNECTION_ERROR_TEXT), true);
            }
        }
    }

    /// Clear the typing notice once its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.typing.expire(now) {
            self.view.set_typing(None);
        }
    }

    /// Show, store and send a chat message. Blank input does nothing.
    pub fn submit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let msg = ChatEvent::chat(self.username.clone(), text);
        self.add_message(&msg, true);
        self.channel.send(&msg);
    }

    /// Tell the room the local user is typing. Sent on every change.
    pub fn input_changed(&mut self) {
        self.channel.send(&ChatEvent::typing(self.username.clone()));
    }

    /// Close the socket, forget the username and go home.
    pub fn leave(&mut self) -> Navigation {
        self.navigate_away();
        self.storage.remove_item(USERNAME_KEY);
        Navigation::Landing
    }

    /// Move to `room_id` if the server knows it.
    pub async fn join(&mut self, room_id: &str) -> Option<Navigation> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return None;
        }
        match self.registry.room_exists(room_id).await {
            Ok(true) => Some(Navigation::Room(room_id.to_string())),
            Ok(false) => {
                self.view.alert(ROOM_NOT_FOUND_ALERT);
                None
            }
            Err(e) => {
                warn!(error = %e, "room probe failed");
                self.view.alert(SERVER_UNREACHABLE_ALERT);
                None
            }
        }
    }

    /// Ask the server for a new room and move there.
    pub async fn create(&mut self) -> Option<Navigation> {
        match self.registry.create().await {
            Ok(room_id) => Some(Navigation::Room(room_id)),
            Err(e) => {
                warn!(error = %e, "room creation failed");
                self.view.alert(CREATE_FAILED_ALERT);
                None
            }
        }
    }

    /// Drop `room_id` from the room list.
    pub fn remove(&mut self, room_id: &str) -> Option<Navigation> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            return None;
        }
        match self.registry.leave(&self.joined, room_id, &self.room_id) {
            LeaveOutcome::Navigate(nav) => Some(nav),
            LeaveOutcome::Remaining(rooms) => {
                self.joined = rooms;
                self.view.render_rooms(&self.joined, &self.room_id);
                None
            }
        }
    }

    /// Go to another room from the list.
    pub fn switch(&mut self, room_id: &str) -> Option<Navigation> {
        let room_id = room_id.trim();
        if room_id.is_empty() || room_id == self.room_id {
            return None;
        }
        if self.joined.iter().any(|r| r == room_id) {
            Some(Navigation::Room(room_id.to_string()))
        } else {
            self.view.notice(&format!("a sala {room_id} não está na lista"));
            None
        }
    }

    pub async fn handle_command(&mut self, command: RoomCommand) -> Option<Navigation> {
        match command {
            RoomCommand::Say(text) => {
                if !text.trim().is_empty() {
                    self.input_changed();
                }
                self.submit(&text);
                None
            }
            RoomCommand::Join(room_id) => self.join(&room_id).await,
            RoomCommand::Create => self.create().await,
            RoomCommand::Switch(room_id) => self.switch(&room_id),
            RoomCommand::Remove(room_id) => self.remove(&room_id),
            RoomCommand::Rooms => {
                self.view.render_rooms(&self.joined, &self.room_id);
                None
            }
            RoomCommand::Leave => Some(self.leave()),
            RoomCommand::Help => {
                self.view.notice(HELP_TEXT);
                None
            }
            RoomCommand::Unknown(name) => {
                self.view.notice(&format!("comando desconhecido: /{name} (tente /help)"));
                None
            }
        }
    }

    /// Drive the view until it navigates somewhere else.
    ///
    /// `input` yields the user's lines; when it closes the socket is shut and
    /// [`Navigation::Exit`] is returned.
    pub async fn run(mut self, input: &mut mpsc::UnboundedReceiver<String>) -> Navigation {
        self.synchronize().await;
        self.connect();

        loop {
            let deadline = self.typing.deadline();
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event, Instant::now());
                }
                line = input.recv() => match line {
                    Some(line) => {
                        let command = RoomCommand::parse(&line);
                        if let Some(nav) = self.handle_command(command).await {
                            self.navigate_away();
                            info!(from = %self.room_id, to = ?nav, "navigating");
                            return nav;
                        }
                    }
                    None => {
                        self.navigate_away();
                        return Navigation::Exit;
                    }
                },
                _ = sleep_until(deadline) => {
                    self.tick(Instant::now());
                }
            }
        }
    }

    fn navigate_away(&mut self) {
        self.state = RoomState::NavigatingAway;
        self.channel.close();
        self.subscriptions.clear();
    }

    fn add_message(&mut self, record: &ChatEvent, save: bool) {
        if let Some(line) = Line::from_event(record, &self.username) {
            self.view.render_line(&line);
        }
        if save && record.is_persistable() {
            self.log.append(&self.room_id, record);
        }
    }
}

fn system_record(text: &str) -> ChatEvent {
    ChatEvent::UserLeft {
        user: SYSTEM_USER.to_string(),
        message: text.to_string(),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
