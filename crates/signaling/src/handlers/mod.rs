//! Handler fuer die einzelnen Client-Ereignisse
//!
//! Alle Handler laufen synchron im Gateway-Reaktor und bekommen den
//! [`Gateway`](crate::gateway::Gateway) exklusiv.

pub mod key_handler;
pub mod message_handler;
pub mod presence_handler;
pub mod room_handler;
