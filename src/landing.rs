//! Landing view: pick a name, then create or join a room.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{ChatError, Result};
use crate::rooms::RoomApi;
use crate::storage::{SharedStorage, USERNAME_KEY};
use crate::view::View;
use crate::Navigation;

const USERNAME_REQUIRED_ALERT: &str = "Por favor, preencha seu nome ou apelido.";
const ROOM_CODE_REQUIRED_ALERT: &str = "Por favor, preencha o código da sala.";
const CREATE_UNREACHABLE_ALERT: &str = "Não foi possível conectar ao servidor para criar a sala.";
const ROOM_NOT_FOUND_ALERT: &str =
    "Erro: Sala não encontrada. Verifique o código e tente novamente.";
const SERVER_UNREACHABLE_ALERT: &str = "Não foi possível conectar ao servidor.";
const NAME_PROMPT: &str = "Nome ou apelido:";
const ROOM_PROMPT: &str = "Código da sala (vazio para criar uma nova):";

pub struct LandingView<A, V> {
    api: A,
    storage: SharedStorage,
    view: V,
    preset_name: Option<String>,
}

impl<A: RoomApi, V: View> LandingView<A, V> {
    pub fn new(api: A, storage: SharedStorage, view: V) -> Self {
        Self {
            api,
            storage,
            view,
            preset_name: None,
        }
    }

    /// Use `name` instead of asking for one on the first attempt.
    pub fn with_username(mut self, name: Option<String>) -> Self {
        self.preset_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Store the trimmed username. Blank input is rejected with an alert and
    /// leaves the session untouched.
    pub fn set_username(&mut self, input: &str) -> Result<String> {
        let username = input.trim();
        if username.is_empty() {
            self.view.alert(USERNAME_REQUIRED_ALERT);
            return Err(ChatError::Validation("username is required".into()));
        }
        self.storage.set_item(USERNAME_KEY, username);
        Ok(username.to_string())
    }

    /// Create a room and go there.
    pub async fn create(&mut self, username: &str) -> Option<Navigation> {
        self.set_username(username).ok()?;
        match self.api.create_room().await {
            Ok(room_id) => Some(Navigation::Room(room_id)),
            Err(e) => {
                warn!(error = %e, "room creation failed");
                self.view.alert(CREATE_UNREACHABLE_ALERT);
                None
            }
        }
    }

    /// Go to `room_id` once the server confirms it exists.
    pub async fn join(&mut self, username: &str, room_id: &str) -> Option<Navigation> {
        let room_id = room_id.trim();
        let username_ok = self.set_username(username).is_ok();
        if room_id.is_empty() {
            self.view.alert(ROOM_CODE_REQUIRED_ALERT);
            return None;
        }
        if !username_ok {
            return None;
        }
        match self.api.room_exists(room_id).await {
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

    /// Ask for a name and a room code until one leads somewhere. A blank
    /// code creates a room. Once a name is accepted only the code is asked
    /// again after a failure. Closed input ends the client.
    pub async fn run(&mut self, input: &mut mpsc::UnboundedReceiver<String>) -> Navigation {
        let mut accepted = self.preset_name.take();
        loop {
            let name = match accepted.clone() {
                Some(name) => name,
                None => {
                    self.view.notice(NAME_PROMPT);
                    let Some(name) = input.recv().await else {
                        return Navigation::Exit;
                    };
                    if self.set_username(&name).is_err() {
                        continue;
                    }
                    name
                }
            };
            accepted = Some(name.clone());

            self.view.notice(ROOM_PROMPT);
            let Some(code) = input.recv().await else {
                return Navigation::Exit;
            };
            let nav = if code.trim().is_empty() {
                self.create(&name).await
            } else {
                self.join(&name, &code).await
            };
            if let Some(nav) = nav {
                return nav;
            }
        }
    }
}
