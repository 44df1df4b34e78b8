//! The chat plane: rendering and fanning out opaque text lines.
//!
//! Deliberately the thinnest component in the system (see the size budget
//! in the architecture notes): build a message, echo it locally, write it to
//! everyone else's direct channel.

use crate::membership::{MembershipView, NodeId};
use crate::output::{self, Output};
use crate::state::SharedState;
use crate::transport::direct;
use crate::wire::Message;

/// Fallback nickname for a chat sender no longer (or never) present in the
/// view. Preserved verbatim from the original reference rather than
/// translated.
const UNKNOWN_SENDER: &str = "Desconhecido";

/// Local echo label, preserved verbatim from the original reference.
const SELF_LABEL: &str = "Você";

pub fn render_incoming(view: &MembershipView, sender_id: NodeId, text: &str) -> String {
    let nickname = view
        .get(sender_id)
        .map(|p| p.nickname.as_str())
        .unwrap_or(UNKNOWN_SENDER);
    format!("[{nickname} (ID:{sender_id})]: {text}")
}

pub fn render_echo(own_id: NodeId, text: &str) -> String {
    format!("[{SELF_LABEL} (ID:{own_id})]: {text}")
}

/// Build, echo, record, and fan out a message the local user typed.
pub async fn send_chat_message(state: &SharedState, text: String, out: &dyn Output) {
    let (own_id, echo_line, targets) = state.with(|s| {
        let echo = render_echo(s.own_id, &text);
        s.push_history(echo.clone());
        let targets: Vec<_> = s.view.others(s.own_id).cloned().collect();
        (s.own_id, echo, targets)
    });

    out.emit(echo_line);

    let message = Message::ChatMessage {
        sender_id: own_id,
        text,
    };
    for peer in targets {
        if let Err(err) = direct::send_to(&peer.addr, &message).await {
            output::system(out, format!("could not deliver chat message to {}: {err}", peer.id));
        }
    }
}

/// Handle an inbound `CHAT_MESSAGE`: render it, append to local history, and
/// show it.
pub fn handle_chat_message(state: &SharedState, sender_id: NodeId, text: &str, out: &dyn Output) {
    let line = state.with(|s| {
        let rendered = render_incoming(&s.view, sender_id, text);
        s.push_history(rendered.clone());
        rendered
    });
    out.emit(line);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::NetAddr;
    use crate::membership::PeerRecord;

    fn view_with(id: u64, nickname: &str) -> MembershipView {
        let mut view = MembershipView::new();
        view.insert(PeerRecord {
            id: NodeId(id),
            addr: NetAddr::new("127.0.0.1", 10001),
            nickname: nickname.to_string(),
        });
        view
    }

    #[test]
    fn renders_known_sender_with_their_nickname() {
        let view = view_with(2, "bob");
        assert_eq!(render_incoming(&view, NodeId(2), "hi"), "[bob (ID:2)]: hi");
    }

    #[test]
    fn renders_unknown_sender_as_desconhecido() {
        let view = MembershipView::new();
        assert_eq!(
            render_incoming(&view, NodeId(9), "hi"),
            "[Desconhecido (ID:9)]: hi"
        );
    }

    #[test]
    fn local_echo_uses_voce_label() {
        assert_eq!(render_echo(NodeId(1), "hello"), "[Você (ID:1)]: hello");
    }

    #[test]
    fn handle_chat_message_appends_to_history_and_emits() {
        let state = SharedState::new(crate::state::NodeState::new(
            "a".into(),
            "127.0.0.1".into(),
            10001,
        ));
        state.with(|s| s.view = view_with(2, "bob"));
        let out = crate::output::CapturingOutput::new();
        handle_chat_message(&state, NodeId(2), "hi", &out);
        assert_eq!(out.lines(), vec!["[bob (ID:2)]: hi".to_string()]);
        state.with(|s| assert_eq!(s.history, vec!["[bob (ID:2)]: hi".to_string()]));
    }
}
