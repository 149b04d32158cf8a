pub mod server;

use crate::cli::globals::Settings;

/// What the CLI asked the process to do.
#[derive(Debug)]
pub enum Action {
    Server { settings: Settings },
}
