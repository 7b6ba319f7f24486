//! Session gateway: websocket transport and wire protocol

pub mod handler;
pub mod protocol;
