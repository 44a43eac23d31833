//! Allow-list gate for inbound senders.

/// Why an inbound sender was rejected.
///
/// Rejections are silent on the wire: the caller logs the reason and sends
/// nothing back, so an unknown party cannot probe for the bot's presence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDenied {
    /// The transport reported no username for the sender.
    Unidentified,
    /// The sender's username is not on the allow-list.
    NotAllowed,
}

impl std::fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unidentified => write!(f, "sender has no username"),
            Self::NotAllowed => write!(f, "username not on allow-list"),
        }
    }
}

/// Check whether `username` may be served.
///
/// Pure lookup over the immutable allow-list. Usernames are compared by
/// exact string equality, no normalization.
pub fn check_access(username: Option<&str>, allow_list: &[String]) -> Result<(), AccessDenied> {
    let Some(username) = username else {
        return Err(AccessDenied::Unidentified);
    };

    if allow_list.iter().any(|allowed| allowed == username) {
        Ok(())
    } else {
        Err(AccessDenied::NotAllowed)
    }
}
