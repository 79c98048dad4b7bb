//! Integration tests for deploybot

mod fakes;
mod test_fsm;
mod test_http_clients;
mod test_server;
