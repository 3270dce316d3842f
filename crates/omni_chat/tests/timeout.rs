mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use omni_chat::app::TurnStatus;
use omni_stream::{Frame, Role};
use omni_transport_mock::{ScriptEnding, ScriptedTransport};
use pretty_assertions::assert_eq;
use support::Harness;

const IDLE: Duration = Duration::from_secs(60);

fn silent_transport() -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::from_frames(vec![Frame::token("hmm")]).with_ending(ScriptEnding::HoldOpen))
}

#[test]
fn idle_turn_is_failed_once_the_timeout_elapses() {
    let mut harness = Harness::new(silent_transport(), IDLE);

    harness.submit("are you there?");
    harness.pump_until("first token", |app, _| {
        app.session().messages().last().is_some_and(|message| message.content == "hmm")
    });

    assert!(!harness.host.expire_idle_turn(Instant::now() + Duration::from_secs(30)));
    assert_eq!(harness.app().status, TurnStatus::Streaming { turn_id: 1 });

    assert!(harness.host.expire_idle_turn(Instant::now() + IDLE + Duration::from_secs(1)));
    {
        let app = harness.app();
        assert_eq!(
            app.status,
            TurnStatus::Failed("no response from the backend for 60s".to_string())
        );
        let last = app.session().messages().last().expect("system message");
        assert_eq!(last.role, Role::System);
        assert_eq!(last.content, "Error: no response from the backend for 60s");
        assert!(!app.session().is_loading());
    }

    harness.pump_until_released();
    assert_eq!(harness.app().cancelling_turn(), None);
}

#[test]
fn expiry_is_not_repeated_for_the_same_turn() {
    let mut harness = Harness::new(silent_transport(), IDLE);
    harness.submit("ping");

    let later = Instant::now() + IDLE * 2;
    assert!(harness.host.expire_idle_turn(later));
    assert!(!harness.host.expire_idle_turn(later));

    harness.pump_until_released();
}

#[test]
fn completed_turn_never_expires() {
    let transport = Arc::new(ScriptedTransport::from_frames(vec![Frame::token("ok"), Frame::Done]));
    let mut harness = Harness::new(transport, IDLE);

    harness.submit("quick");
    harness.pump_until("completion", |app, _| app.status == TurnStatus::Idle);

    assert!(!harness.host.expire_idle_turn(Instant::now() + IDLE * 2));
    assert_eq!(harness.app().status, TurnStatus::Idle);
}
