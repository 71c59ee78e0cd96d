//! Chrome DevTools Protocol client
//!
//! Just enough of CDP to open a page, evaluate JavaScript and dispatch input.
//! Both supported engines (Chrome and Edge) are Chromium based and speak it.

pub mod connection;
pub mod transport;
pub mod types;

pub use connection::{Connection, Session};
pub use transport::Transport;
pub use types::{MouseButton, MouseEventType};
