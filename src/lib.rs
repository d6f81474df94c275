// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules.
//
// Module responsibilities:
// - `api`: blocking client for the noIPFraud admin API (login, token
//   lifecycle, campaign endpoints, bulk helpers).
// - `campaign`: campaign records, status codes and request payloads.
// - `report`: status and block-rate reports built from campaign lists.
// - `session`: bearer token expiry and the on-disk session cache.
// - `sftp`: key-based SFTP connectivity probe for landing servers.
// - `config`: API settings and the SFTP server inventory.
// - `cli` / `ui`: command parsing, dispatch and terminal rendering.
pub mod api;
pub mod campaign;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod session;
pub mod sftp;
pub mod ui;

pub use api::NoIPFraudClient;
pub use error::{ApiError, SessionError, SftpError};
