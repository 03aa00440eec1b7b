// Library root
// ------------
// The binary (`main.rs`) only parses arguments and calls `app::execute`.
//
// Module responsibilities:
// - `cli`: clap definitions and upload input selection.
// - `config`: environment + config file settings.
// - `api`: blocking GitHub REST client implementing the `store` traits.
// - `source`, `clipboard`, `namespace`: what to upload and where.
// - `upload`, `download`, `run`: orchestration over the `store` traits.
// - `auth`: device flow for `shbin auth`.
// - `ui`: terminal output and prompts.
pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod download;
pub mod error;
pub mod namespace;
pub mod poll;
pub mod run;
pub mod source;
pub mod store;
pub mod ui;
pub mod upload;
