pub mod axis;
pub mod channel;
pub mod config;
pub mod connection;
pub mod error;
pub mod guard;
pub mod notify;
pub mod protocol;
pub mod socket_server;
pub mod station;
pub mod station_manager;
pub mod sync;
