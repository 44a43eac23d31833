//! Update dispatch: authorization gate, command routing, and the
//! confirmation flow for privileged actions.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    access::{check_access, AccessDenied},
    commands::{
        decode_callback, route, Command, ConfirmChoice, PendingAction,
        LOCATION_LIVE_PERIOD_SECS, MSG_CANCELED, MSG_ERROR, MSG_HELP,
    },
    config::Config,
    domain::ChatId,
    messaging::{
        port::MessagingPort,
        types::{CallbackEvent, IncomingEvent, InlineKeyboard, TextEvent},
    },
    system::{PowerControl, SystemProbe},
};

/// The update-dispatch agent.
///
/// Owns no mutable state: the allow-list is immutable for the process
/// lifetime and pending confirmations live entirely in the callback data of
/// their prompt message.
pub struct Agent {
    allow_list: Vec<String>,
    messenger: Arc<dyn MessagingPort>,
    system: Arc<dyn SystemProbe>,
    power: Arc<dyn PowerControl>,
}

impl Agent {
    pub fn new(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        system: Arc<dyn SystemProbe>,
        power: Arc<dyn PowerControl>,
    ) -> Self {
        Self {
            allow_list: cfg.allowed_usernames.clone(),
            messenger,
            system,
            power,
        }
    }

    /// Entry point for every inbound event, both kinds.
    ///
    /// Unauthorized senders are dropped silently: logged, no reply, so an
    /// unknown party cannot probe for the bot's presence. Nothing in here is
    /// fatal to the event loop.
    pub async fn handle_event(&self, event: IncomingEvent) {
        let (username, sender_name) = match &event {
            IncomingEvent::Text(m) => (m.username.as_deref(), m.sender_name.as_str()),
            IncomingEvent::Callback(q) => (q.username.as_deref(), q.sender_name.as_str()),
        };

        if let Err(denied) = check_access(username, &self.allow_list) {
            match denied {
                AccessDenied::Unidentified => {
                    warn!(sender = sender_name, "not allowed (no username)");
                }
                AccessDenied::NotAllowed => {
                    warn!(username = username.unwrap_or_default(), "not allowed");
                }
            }
            return;
        }

        match event {
            IncomingEvent::Text(msg) => self.handle_text(msg).await,
            IncomingEvent::Callback(query) => self.handle_callback(query).await,
        }
    }

    async fn handle_text(&self, msg: TextEvent) {
        debug!(text = %msg.text, "received telegram message");

        // 'is typing...'
        if let Err(e) = self.messenger.send_typing(msg.chat_id).await {
            debug!(error = %e, "failed to send chat action");
        }

        match route(&msg.text) {
            Command::Start | Command::Help => self.reply(msg.chat_id, MSG_HELP).await,
            Command::Status => self.report_status(msg.chat_id).await,
            Command::Location => self.share_location(msg.chat_id).await,
            Command::Reboot => self.confirm(msg.chat_id, PendingAction::Reboot).await,
            Command::Shutdown => self.confirm(msg.chat_id, PendingAction::Shutdown).await,
            Command::Unknown(raw) => {
                info!(text = %raw, "no such command");
                self.reply(msg.chat_id, &format!("No such command: {raw}")).await;
            }
        }
    }

    /// Resolve a button press on a confirmation prompt.
    ///
    /// The sequencing is load-bearing: answer the callback, then finalize
    /// the prompt text, and only then run the action. Reboot or shutdown can
    /// cut connectivity, so every user-facing send must be done first.
    async fn handle_callback(&self, query: CallbackEvent) {
        let (terminal_text, action) = match decode_callback(&query.data) {
            Some(ConfirmChoice::Cancel) => (MSG_CANCELED, None),
            Some(ConfirmChoice::Proceed(action)) => (action.terminal_text(), Some(action)),
            None => {
                warn!(data = %query.data, "unprocessable callback query data");
                (MSG_ERROR, None)
            }
        };

        if let Err(e) = self
            .messenger
            .answer_callback(&query.callback_id, Some(terminal_text))
            .await
        {
            warn!(error = %e, "failed to answer callback query");
            return;
        }

        let Some(prompt) = query.message else {
            warn!("callback query carries no message; leaving prompt as-is");
            return;
        };

        // Edit in place; this also strips the inline buttons.
        if let Err(e) = self.messenger.edit_text(prompt, terminal_text).await {
            warn!(error = %e, "failed to edit message text");
            return;
        }

        let Some(action) = action else {
            return;
        };

        let outcome = match action {
            PendingAction::Reboot => self.power.reboot_now().await,
            PendingAction::Shutdown => self.power.shutdown_now().await,
        };
        if let Err(e) = outcome {
            // Best-effort relay of the diagnostic to the chat.
            self.reply(prompt.chat_id, &e.to_string()).await;
        }
    }

    /// Send a text reply, logging (and otherwise ignoring) delivery
    /// failures.
    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            warn!(error = %e, "failed to send message");
        }
    }

    /// Compose the multi-field status report.
    ///
    /// Every probe may fail on its own; a failed probe leaves its field
    /// blank instead of aborting the reply.
    async fn report_status(&self, chat_id: ChatId) {
        let hostname = self.system.hostname().await.unwrap_or_default();
        let internal_ips = self.system.ip_addresses().await.join(", ");
        let external_ip = self.system.external_ip().await.unwrap_or_default();
        let uptime = self.system.uptime().await.unwrap_or_default();
        let free_spaces = self.system.free_spaces().await.unwrap_or_default();

        let report = format!(
            "Hostname : {hostname}\n\nInternal IP : {internal_ips}\n\nExternal IP : {external_ip}\n\nUptime :\n{uptime}\n\nFree Spaces :\n{free_spaces}"
        );
        self.reply(chat_id, &report).await;
    }

    async fn share_location(&self, chat_id: ChatId) {
        let ip = match self.system.external_ip().await {
            Ok(ip) => ip,
            Err(e) => {
                self.reply(chat_id, &format!("Failed to get external ip address: {e}"))
                    .await;
                return;
            }
        };

        match self.system.geo_location(&ip).await {
            Ok(point) => {
                if let Err(e) = self
                    .messenger
                    .send_location(chat_id, point, Some(LOCATION_LIVE_PERIOD_SECS))
                    .await
                {
                    warn!(error = %e, "failed to send location");
                }
            }
            Err(e) => {
                self.reply(chat_id, &format!("Failed to get geo location: {e}"))
                    .await;
            }
        }
    }

    /// Send the yes/cancel prompt for a privileged action. Nothing runs
    /// until the confirming callback arrives.
    async fn confirm(&self, chat_id: ChatId, action: PendingAction) {
        if let Err(e) = self
            .messenger
            .send_confirm(chat_id, action.prompt(), InlineKeyboard::confirm(action))
            .await
        {
            warn!(error = %e, "failed to send message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::{
        domain::{GeoPoint, MessageId, MessageRef},
        errors::Error,
        Result,
    };

    /// Everything the agent did, across all three ports, in call order.
    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Typing,
        SendText(String),
        SendConfirm {
            text: String,
            buttons: Vec<(String, String)>,
        },
        SendLocation {
            latitude: f64,
            longitude: f64,
            live_period: Option<u32>,
        },
        AnswerCallback {
            notice: Option<String>,
        },
        EditText {
            message_id: i32,
            text: String,
        },
        Reboot,
        Shutdown,
    }

    type CallLog = Arc<Mutex<Vec<Call>>>;

    #[derive(Clone, Copy, Default)]
    struct Faults {
        send: bool,
        answer: bool,
        edit: bool,
        probes: bool,
        external_ip: bool,
        geo: bool,
        power: bool,
    }

    struct FakeMessenger {
        log: CallLog,
        faults: Faults,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.log.lock().unwrap().push(Call::SendText(text.to_string()));
            if self.faults.send {
                return Err(Error::Transport("chat not found".to_string()));
            }
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_confirm(
            &self,
            chat_id: ChatId,
            text: &str,
            keyboard: InlineKeyboard,
        ) -> Result<MessageRef> {
            let buttons = keyboard
                .buttons
                .into_iter()
                .map(|b| (b.label, b.callback_data))
                .collect();
            self.log.lock().unwrap().push(Call::SendConfirm {
                text: text.to_string(),
                buttons,
            });
            if self.faults.send {
                return Err(Error::Transport("chat not found".to_string()));
            }
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(2),
            })
        }

        async fn send_location(
            &self,
            chat_id: ChatId,
            point: GeoPoint,
            live_period: Option<u32>,
        ) -> Result<MessageRef> {
            self.log.lock().unwrap().push(Call::SendLocation {
                latitude: point.latitude,
                longitude: point.longitude,
                live_period,
            });
            if self.faults.send {
                return Err(Error::Transport("chat not found".to_string()));
            }
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(3),
            })
        }

        async fn send_typing(&self, _chat_id: ChatId) -> Result<()> {
            self.log.lock().unwrap().push(Call::Typing);
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, notice: Option<&str>) -> Result<()> {
            self.log.lock().unwrap().push(Call::AnswerCallback {
                notice: notice.map(|s| s.to_string()),
            });
            if self.faults.answer {
                return Err(Error::Transport("query is too old".to_string()));
            }
            Ok(())
        }

        async fn edit_text(&self, message: MessageRef, text: &str) -> Result<()> {
            self.log.lock().unwrap().push(Call::EditText {
                message_id: message.message_id.0,
                text: text.to_string(),
            });
            if self.faults.edit {
                return Err(Error::Transport("message to edit not found".to_string()));
            }
            Ok(())
        }
    }

    struct FakeProbe {
        faults: Faults,
    }

    #[async_trait]
    impl SystemProbe for FakeProbe {
        async fn hostname(&self) -> Result<String> {
            if self.faults.probes {
                return Err(Error::Probe("hostname unavailable".to_string()));
            }
            Ok("raspberrypi".to_string())
        }

        async fn ip_addresses(&self) -> Vec<String> {
            if self.faults.probes {
                return Vec::new();
            }
            vec!["192.168.1.20".to_string(), "10.0.0.5".to_string()]
        }

        async fn external_ip(&self) -> Result<String> {
            if self.faults.probes || self.faults.external_ip {
                return Err(Error::Probe("lookup timed out".to_string()));
            }
            Ok("203.0.113.7".to_string())
        }

        async fn uptime(&self) -> Result<String> {
            if self.faults.probes {
                return Err(Error::Probe("uptime unavailable".to_string()));
            }
            Ok("1d 2h 3m".to_string())
        }

        async fn free_spaces(&self) -> Result<String> {
            if self.faults.probes {
                return Err(Error::Probe("no disks found".to_string()));
            }
            Ok("/: 10.0 GiB free of 29.7 GiB".to_string())
        }

        async fn geo_location(&self, _ip: &str) -> Result<GeoPoint> {
            if self.faults.geo {
                return Err(Error::Probe("reserved range".to_string()));
            }
            Ok(GeoPoint {
                latitude: 37.5665,
                longitude: 126.978,
            })
        }
    }

    struct FakePower {
        log: CallLog,
        faults: Faults,
    }

    #[async_trait]
    impl PowerControl for FakePower {
        async fn reboot_now(&self) -> Result<String> {
            self.log.lock().unwrap().push(Call::Reboot);
            if self.faults.power {
                return Err(Error::Power("sudo: a password is required".to_string()));
            }
            Ok(String::new())
        }

        async fn shutdown_now(&self) -> Result<String> {
            self.log.lock().unwrap().push(Call::Shutdown);
            if self.faults.power {
                return Err(Error::Power("sudo: a password is required".to_string()));
            }
            Ok(String::new())
        }
    }

    fn agent_with(faults: Faults) -> (Agent, CallLog) {
        let log = CallLog::default();
        let cfg = Config {
            bot_token: "123:abc".to_string(),
            allowed_usernames: vec!["alice".to_string()],
            poll_interval: Duration::from_secs(1),
            verbose: false,
        };
        let agent = Agent::new(
            &cfg,
            Arc::new(FakeMessenger {
                log: log.clone(),
                faults,
            }),
            Arc::new(FakeProbe { faults }),
            Arc::new(FakePower {
                log: log.clone(),
                faults,
            }),
        );
        (agent, log)
    }

    fn text_from(username: Option<&str>, text: &str) -> IncomingEvent {
        IncomingEvent::Text(TextEvent {
            chat_id: ChatId(77),
            username: username.map(|s| s.to_string()),
            sender_name: "Nick".to_string(),
            text: text.to_string(),
        })
    }

    fn callback_from(username: Option<&str>, data: &str) -> IncomingEvent {
        IncomingEvent::Callback(CallbackEvent {
            callback_id: "cb-1".to_string(),
            username: username.map(|s| s.to_string()),
            sender_name: "Nick".to_string(),
            data: data.to_string(),
            message: Some(MessageRef {
                chat_id: ChatId(77),
                message_id: MessageId(42),
            }),
        })
    }

    fn calls(log: &CallLog) -> Vec<Call> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn unauthorized_text_produces_no_outbound_calls() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("mallory"), "/status")).await;
        assert!(calls(&log).is_empty());
    }

    #[tokio::test]
    async fn unauthorized_callback_produces_no_outbound_calls() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(callback_from(Some("mallory"), "/reboot")).await;
        assert!(calls(&log).is_empty());
    }

    #[tokio::test]
    async fn unidentified_sender_is_dropped() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(None, "/status")).await;
        assert!(calls(&log).is_empty());
    }

    #[tokio::test]
    async fn start_and_help_reply_with_usage() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/start")).await;
        agent.handle_event(text_from(Some("alice"), "/help")).await;

        let texts: Vec<Call> = calls(&log);
        assert_eq!(
            texts,
            vec![
                Call::Typing,
                Call::SendText(MSG_HELP.to_string()),
                Call::Typing,
                Call::SendText(MSG_HELP.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn status_replies_with_one_composed_report() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/status")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::Typing,
                Call::SendText(
                    "Hostname : raspberrypi\n\n\
                     Internal IP : 192.168.1.20, 10.0.0.5\n\n\
                     External IP : 203.0.113.7\n\n\
                     Uptime :\n1d 2h 3m\n\n\
                     Free Spaces :\n/: 10.0 GiB free of 29.7 GiB"
                        .to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn status_still_replies_once_when_every_probe_fails() {
        let (agent, log) = agent_with(Faults {
            probes: true,
            ..Faults::default()
        });
        agent.handle_event(text_from(Some("alice"), "/status")).await;

        let calls = calls(&log);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::Typing);
        let Call::SendText(report) = &calls[1] else {
            panic!("expected a text reply, got {:?}", calls[1]);
        };
        for section in ["Hostname :", "Internal IP :", "External IP :", "Uptime :", "Free Spaces :"]
        {
            assert!(report.contains(section), "missing {section} in {report:?}");
        }
    }

    #[tokio::test]
    async fn unknown_command_echoes_raw_text() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/frobnicate")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::Typing,
                Call::SendText("No such command: /frobnicate".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn reboot_command_prompts_without_acting() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/reboot")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::Typing,
                Call::SendConfirm {
                    text: "Really reboot?".to_string(),
                    buttons: vec![
                        ("Yes".to_string(), "/reboot".to_string()),
                        ("Cancel".to_string(), "/cancel".to_string()),
                    ],
                },
            ]
        );
    }

    #[tokio::test]
    async fn shutdown_command_prompts_without_acting() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/shutdown")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::Typing,
                Call::SendConfirm {
                    text: "Really shutdown?".to_string(),
                    buttons: vec![
                        ("Yes".to_string(), "/shutdown".to_string()),
                        ("Cancel".to_string(), "/cancel".to_string()),
                    ],
                },
            ]
        );
    }

    #[tokio::test]
    async fn location_shares_a_live_location() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(text_from(Some("alice"), "/where")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::Typing,
                Call::SendLocation {
                    latitude: 37.5665,
                    longitude: 126.978,
                    live_period: Some(60),
                },
            ]
        );
    }

    #[tokio::test]
    async fn location_reports_external_ip_failure() {
        let (agent, log) = agent_with(Faults {
            external_ip: true,
            ..Faults::default()
        });
        agent.handle_event(text_from(Some("alice"), "/where")).await;

        let calls = calls(&log);
        let Call::SendText(text) = &calls[1] else {
            panic!("expected a text reply, got {:?}", calls[1]);
        };
        assert!(text.starts_with("Failed to get external ip address: "), "{text:?}");
    }

    #[tokio::test]
    async fn location_reports_geo_lookup_failure() {
        let (agent, log) = agent_with(Faults {
            geo: true,
            ..Faults::default()
        });
        agent.handle_event(text_from(Some("alice"), "/where")).await;

        let calls = calls(&log);
        let Call::SendText(text) = &calls[1] else {
            panic!("expected a text reply, got {:?}", calls[1]);
        };
        assert!(text.starts_with("Failed to get geo location: "), "{text:?}");
    }

    #[tokio::test]
    async fn confirmed_reboot_runs_after_prompt_is_finalized() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(callback_from(Some("alice"), "/reboot")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::AnswerCallback {
                    notice: Some("Rebooting...".to_string()),
                },
                Call::EditText {
                    message_id: 42,
                    text: "Rebooting...".to_string(),
                },
                Call::Reboot,
            ]
        );
    }

    #[tokio::test]
    async fn confirmed_shutdown_runs_after_prompt_is_finalized() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(callback_from(Some("alice"), "/shutdown")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::AnswerCallback {
                    notice: Some("Shutting down...".to_string()),
                },
                Call::EditText {
                    message_id: 42,
                    text: "Shutting down...".to_string(),
                },
                Call::Shutdown,
            ]
        );
    }

    #[tokio::test]
    async fn cancel_finalizes_the_prompt_without_acting() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(callback_from(Some("alice"), "/cancel")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::AnswerCallback {
                    notice: Some("Canceled.".to_string()),
                },
                Call::EditText {
                    message_id: 42,
                    text: "Canceled.".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn unknown_callback_data_finalizes_with_error_text() {
        let (agent, log) = agent_with(Faults::default());
        agent.handle_event(callback_from(Some("alice"), "gibberish")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::AnswerCallback {
                    notice: Some("Error.".to_string()),
                },
                Call::EditText {
                    message_id: 42,
                    text: "Error.".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn answer_failure_suppresses_edit_and_action() {
        let (agent, log) = agent_with(Faults {
            answer: true,
            ..Faults::default()
        });
        agent.handle_event(callback_from(Some("alice"), "/reboot")).await;

        assert_eq!(
            calls(&log),
            vec![Call::AnswerCallback {
                notice: Some("Rebooting...".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn edit_failure_suppresses_the_action() {
        let (agent, log) = agent_with(Faults {
            edit: true,
            ..Faults::default()
        });
        agent.handle_event(callback_from(Some("alice"), "/shutdown")).await;

        assert_eq!(
            calls(&log),
            vec![
                Call::AnswerCallback {
                    notice: Some("Shutting down...".to_string()),
                },
                Call::EditText {
                    message_id: 42,
                    text: "Shutting down...".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn callback_without_a_message_skips_edit_and_action() {
        let (agent, log) = agent_with(Faults::default());
        agent
            .handle_event(IncomingEvent::Callback(CallbackEvent {
                callback_id: "cb-1".to_string(),
                username: Some("alice".to_string()),
                sender_name: "Nick".to_string(),
                data: "/reboot".to_string(),
                message: None,
            }))
            .await;

        assert_eq!(
            calls(&log),
            vec![Call::AnswerCallback {
                notice: Some("Rebooting...".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn power_failure_diagnostic_is_relayed_to_the_chat() {
        let (agent, log) = agent_with(Faults {
            power: true,
            ..Faults::default()
        });
        agent.handle_event(callback_from(Some("alice"), "/reboot")).await;

        let calls = calls(&log);
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[2], Call::Reboot);
        let Call::SendText(text) = &calls[3] else {
            panic!("expected a diagnostic reply, got {:?}", calls[3]);
        };
        assert!(text.contains("sudo: a password is required"), "{text:?}");
    }

    #[tokio::test]
    async fn send_failures_are_tolerated() {
        let (agent, log) = agent_with(Faults {
            send: true,
            ..Faults::default()
        });
        agent.handle_event(text_from(Some("alice"), "/status")).await;
        agent.handle_event(text_from(Some("alice"), "/help")).await;

        // Both events were still processed to completion.
        assert_eq!(calls(&log).len(), 4);
    }
}
