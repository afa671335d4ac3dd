use serde::{Deserialize, Serialize};

/// Request body for login. Missing fields read as empty strings.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Request body for registration; presence is checked by the handler.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: SessionUser,
}

/// User summary returned by login.
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: i32,
    pub username: String,
}
