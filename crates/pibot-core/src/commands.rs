//! The fixed command surface: tokens, user-facing texts, and the classifier.

/// Command tokens, matched as case-sensitive leading prefixes.
pub const CMD_START: &str = "/start";
pub const CMD_STATUS: &str = "/status";
pub const CMD_LOCATION: &str = "/where";
pub const CMD_REBOOT: &str = "/reboot";
pub const CMD_SHUTDOWN: &str = "/shutdown";
pub const CMD_HELP: &str = "/help";
pub const CMD_CANCEL: &str = "/cancel";

/// Button labels on a confirmation prompt.
pub const BUTTON_YES: &str = "Yes";
pub const BUTTON_CANCEL: &str = "Cancel";

pub const MSG_CONFIRM_REBOOT: &str = "Really reboot?";
pub const MSG_CONFIRM_SHUTDOWN: &str = "Really shutdown?";
pub const MSG_REBOOTING: &str = "Rebooting...";
pub const MSG_SHUTTING_DOWN: &str = "Shutting down...";
pub const MSG_CANCELED: &str = "Canceled.";
pub const MSG_ERROR: &str = "Error.";
pub const MSG_HELP: &str = "Usage:

/status  : Show current status of your Raspberry Pi.
/where   : Show current location of your Raspberry Pi. (based on external IP)
/reboot  : Reboot your Raspberry Pi.
/shutdown: Shutdown your Raspberry Pi.
/help    : Show this help message.
";

/// How long a `/where` share stays live-updating, in seconds.
pub const LOCATION_LIVE_PERIOD_SECS: u32 = 60;

/// A classified inbound text command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Location,
    Reboot,
    Shutdown,
    Help,
    /// Matched no token; carries the raw text for echo-back.
    Unknown(String),
}

/// The ordered (token, variant) table `route` matches against.
///
/// First match wins, so the order here is the routing priority and the
/// tokens must be mutually non-prefixing.
const ROUTES: [(&str, Command); 6] = [
    (CMD_START, Command::Start),
    (CMD_STATUS, Command::Status),
    (CMD_LOCATION, Command::Location),
    (CMD_REBOOT, Command::Reboot),
    (CMD_SHUTDOWN, Command::Shutdown),
    (CMD_HELP, Command::Help),
];

/// Classify raw inbound text by leading-prefix match.
pub fn route(text: &str) -> Command {
    for (token, command) in &ROUTES {
        if text.starts_with(token) {
            return command.clone();
        }
    }
    Command::Unknown(text.to_string())
}

/// A privileged action awaiting confirmation, round-tripped as opaque
/// callback data on the prompt's buttons. There is no server-side table;
/// the button payload is the whole state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Reboot,
    Shutdown,
}

impl PendingAction {
    /// The opaque token carried in the button payload.
    pub fn token(self) -> &'static str {
        match self {
            Self::Reboot => CMD_REBOOT,
            Self::Shutdown => CMD_SHUTDOWN,
        }
    }

    /// The question shown on the confirmation prompt.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Reboot => MSG_CONFIRM_REBOOT,
            Self::Shutdown => MSG_CONFIRM_SHUTDOWN,
        }
    }

    /// The terminal text the prompt collapses to once confirmed.
    pub fn terminal_text(self) -> &'static str {
        match self {
            Self::Reboot => MSG_REBOOTING,
            Self::Shutdown => MSG_SHUTTING_DOWN,
        }
    }
}

/// The user's choice on a confirmation prompt, decoded from callback data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfirmChoice {
    Proceed(PendingAction),
    Cancel,
}

/// Decode callback data back into a choice.
///
/// Anything outside the three known tokens yields `None` and must never
/// trigger a privileged action.
pub fn decode_callback(data: &str) -> Option<ConfirmChoice> {
    if data.starts_with(CMD_CANCEL) {
        Some(ConfirmChoice::Cancel)
    } else if data.starts_with(CMD_REBOOT) {
        Some(ConfirmChoice::Proceed(PendingAction::Reboot))
    } else if data.starts_with(CMD_SHUTDOWN) {
        Some(ConfirmChoice::Proceed(PendingAction::Shutdown))
    } else {
        None
    }
}

/// Token rows for the persistent reply keyboard, built once at startup.
pub fn keyboard_rows() -> Vec<Vec<&'static str>> {
    vec![
        vec![CMD_STATUS, CMD_LOCATION, CMD_HELP],
        vec![CMD_REBOOT, CMD_SHUTDOWN],
    ]
}
