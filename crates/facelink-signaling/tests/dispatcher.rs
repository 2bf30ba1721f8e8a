mod common;

use std::time::Duration;

use common::{answer, candidate, offer, PeerCall, RecordingPeer, ScriptedChannel, WhenDrained};
use facelink_common::{Error, SdpKind, SessionDescription, SignalingMessage};
use facelink_signaling::{dispatch_one, run, Dispatch, EndReason, SessionOutcome};

#[tokio::test]
async fn test_offer_sets_remote_then_sends_one_answer() {
    let mut channel = ScriptedChannel::new(vec![offer("A")], WhenDrained::Pending);
    let peer = RecordingPeer::new();

    let step = dispatch_one(&mut channel, &peer).await.unwrap();

    assert_eq!(step, Dispatch::Continue);
    assert_eq!(
        peer.calls(),
        vec![
            PeerCall::SetRemote(SessionDescription::offer("A")),
            PeerCall::CreateAnswer,
            PeerCall::SetLocal(SessionDescription::answer("answer-to:A")),
        ]
    );
    assert_eq!(peer.count(|c| matches!(c, PeerCall::SetLocal(_))), 1);
    assert_eq!(channel.sent, vec![answer("answer-to:A")]);
}

#[tokio::test]
async fn test_answer_sets_remote_and_sends_nothing() {
    let mut channel = ScriptedChannel::new(vec![answer("A")], WhenDrained::Pending);
    let peer = RecordingPeer::new();

    let step = dispatch_one(&mut channel, &peer).await.unwrap();

    assert_eq!(step, Dispatch::Continue);
    assert_eq!(
        peer.calls(),
        vec![PeerCall::SetRemote(SessionDescription::answer("A"))]
    );
    assert!(channel.sent.is_empty());
}

#[tokio::test]
async fn test_candidate_is_applied_once_without_reply() {
    let msg = candidate("candidate:1 1 udp 2122260223 10.0.0.2 40000 typ host");
    let mut channel = ScriptedChannel::new(vec![msg.clone()], WhenDrained::Pending);
    let peer = RecordingPeer::new();

    dispatch_one(&mut channel, &peer).await.unwrap();

    let SignalingMessage::Candidate(expected) = msg else {
        unreachable!()
    };
    assert_eq!(peer.calls(), vec![PeerCall::AddCandidate(expected)]);
    assert!(channel.sent.is_empty());
}

#[tokio::test]
async fn test_repeated_candidate_is_not_deduplicated() {
    let msg = candidate("candidate:7 1 udp 1 10.0.0.9 9 typ host");
    let mut channel = ScriptedChannel::new(vec![msg.clone(), msg], WhenDrained::Closed);
    let peer = RecordingPeer::new();

    let outcome = run(&mut channel, &peer, None).await.unwrap();

    assert_eq!(peer.count(|c| matches!(c, PeerCall::AddCandidate(_))), 2);
    assert_eq!(
        outcome,
        SessionOutcome::Ended {
            reason: EndReason::ChannelClosed,
            messages: 3
        }
    );
}

#[tokio::test]
async fn test_bye_terminates_and_stops_reading() {
    let mut channel = ScriptedChannel::new(
        vec![SignalingMessage::Bye, answer("never-read")],
        WhenDrained::Pending,
    );
    let peer = RecordingPeer::new();

    assert_eq!(
        dispatch_one(&mut channel, &peer).await.unwrap(),
        Dispatch::Terminate(EndReason::Bye)
    );

    let mut channel = ScriptedChannel::new(
        vec![SignalingMessage::Bye, answer("never-read")],
        WhenDrained::Pending,
    );
    let outcome = run(&mut channel, &peer, None).await.unwrap();
    assert_eq!(
        outcome,
        SessionOutcome::Ended {
            reason: EndReason::Bye,
            messages: 1
        }
    );
    assert_eq!(channel.receives, 1);
    assert_eq!(channel.incoming.len(), 1);
    assert!(peer.calls().is_empty());
}

#[tokio::test]
async fn test_offer_candidate_bye_scenario() {
    let c1 = candidate("candidate:1 1 udp 2122260223 192.168.0.5 50000 typ host");
    let mut channel = ScriptedChannel::new(
        vec![offer("A"), c1.clone(), SignalingMessage::Bye],
        WhenDrained::Pending,
    );
    let peer = RecordingPeer::new();

    let outcome = run(&mut channel, &peer, None).await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Ended {
            reason: EndReason::Bye,
            messages: 3
        }
    );
    assert_eq!(channel.sent.len(), 1);
    match &channel.sent[0] {
        SignalingMessage::Description(desc) => {
            assert_eq!(desc.kind, SdpKind::Answer);
            assert_eq!(desc.sdp, "answer-to:A");
        }
        other => panic!("expected an answer, got {other:?}"),
    }
    let SignalingMessage::Candidate(c1) = c1 else {
        unreachable!()
    };
    assert_eq!(
        peer.count(|c| *c == PeerCall::AddCandidate(c1.clone())),
        1
    );
}

#[tokio::test]
async fn test_limit_stops_a_silent_channel() {
    let mut channel = ScriptedChannel::new(vec![answer("A")], WhenDrained::Pending);
    let peer = RecordingPeer::new();

    let outcome = tokio::time::timeout(Duration::from_secs(5), run(&mut channel, &peer, Some(1)))
        .await
        .expect("limit must end the loop")
        .unwrap();

    assert_eq!(outcome, SessionOutcome::LimitReached { messages: 1 });
    assert!(channel.sent.is_empty());
    assert_eq!(channel.receives, 1);
}

#[tokio::test]
async fn test_zero_limit_reads_nothing() {
    let mut channel = ScriptedChannel::new(vec![offer("A")], WhenDrained::Pending);
    let peer = RecordingPeer::new();

    let outcome = run(&mut channel, &peer, Some(0)).await.unwrap();

    assert_eq!(outcome, SessionOutcome::LimitReached { messages: 0 });
    assert_eq!(channel.receives, 0);
}

#[tokio::test]
async fn test_closed_channel_is_graceful_termination() {
    let mut channel = ScriptedChannel::new(vec![], WhenDrained::Closed);
    let peer = RecordingPeer::new();

    assert_eq!(
        dispatch_one(&mut channel, &peer).await.unwrap(),
        Dispatch::Terminate(EndReason::ChannelClosed)
    );
}

#[tokio::test]
async fn test_peer_failure_propagates_immediately() {
    let mut channel = ScriptedChannel::new(
        vec![offer("bad"), SignalingMessage::Bye],
        WhenDrained::Pending,
    );
    let peer = RecordingPeer::new();
    *peer.fail_remote.lock().unwrap() = Some("malformed sdp".to_string());

    let err = run(&mut channel, &peer, None).await.unwrap_err();

    assert!(matches!(err, Error::Negotiation(_)));
    assert!(channel.sent.is_empty());
    assert_eq!(channel.incoming.len(), 1, "nothing read after the failure");
}

#[tokio::test]
async fn test_channel_protocol_error_propagates() {
    let mut channel = ScriptedChannel::new(vec![], WhenDrained::Pending);
    channel.fail_receive = Some("unrecognized signaling message".to_string());
    let peer = RecordingPeer::new();

    let err = run(&mut channel, &peer, None).await.unwrap_err();
    assert!(err.is_protocol());
}
