pub mod credential;
pub mod health;
pub mod rpc;
