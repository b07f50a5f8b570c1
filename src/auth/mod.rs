pub mod blacklist;
pub mod credentials;
pub mod handlers;
pub mod password;
pub mod tokens;
