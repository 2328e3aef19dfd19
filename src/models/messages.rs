use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    pub identifier: String,
    pub creator_secret: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClientEditMessage {
    pub identifier: String,
    pub full_text: String,
    /// Informational only. Server order is authoritative.
    pub client_timestamp: Option<i64>,
}

/// Messages a client may send over the sync socket
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join-room")]
    JoinRoom(JoinRoomMessage),
    #[serde(rename = "client-edit")]
    ClientEdit(ClientEditMessage),
    #[serde(rename = "leave-room")]
    LeaveRoom,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomDataMessage {
    pub identifier: String,
    pub content: String,
    pub is_creator: bool,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ServerEditMessage {
    pub identifier: String,
    pub full_text: String,
    /// Epoch milliseconds, assigned when the edit was accepted
    pub server_timestamp: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Messages the server emits over the sync socket
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "room-data")]
    RoomData(RoomDataMessage),
    #[serde(rename = "server-edit")]
    ServerEdit(ServerEditMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}
