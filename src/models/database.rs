//! Target database models
//!
//! Connection parameters handed to the SQL command-line client.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable the client reads its password from
pub const PASSWORD_ENV: &str = "PGPASSWORD";

/// Connection parameters for the database under test
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            user: String::new(),
            password: String::new(),
            dbname: String::new(),
        }
    }
}

impl DatabaseConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            dbname: dbname.into(),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[cfg(test)]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Names of required fields that are still empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.is_empty() {
            missing.push("host");
        }
        if self.user.is_empty() {
            missing.push("user");
        }
        if self.dbname.is_empty() {
            missing.push("dbname");
        }
        missing
    }

    /// Client arguments for running one script file.
    ///
    /// The password never appears here; see [`PASSWORD_ENV`].
    pub fn script_args(&self, script: &str) -> Vec<String> {
        vec![
            "-a".to_string(),
            "-X".to_string(),
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            self.port.to_string(),
            "-U".to_string(),
            self.user.clone(),
            "-d".to_string(),
            self.dbname.clone(),
            "-f".to_string(),
            script.to_string(),
            "-w".to_string(),
        ]
    }

    /// Environment overlay carrying the credential
    pub fn password_env(&self) -> Vec<(String, String)> {
        vec![(PASSWORD_ENV.to_string(), self.password.clone())]
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("dbname", &self.dbname)
            .finish()
    }
}

impl fmt::Display for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }
}
