//! End-to-end session tests.
//!
//! These drive a session through the in-memory transport the way a socket
//! would, including arbitrary chunking of the server's bytes.

use bytes::Bytes;
use proptest::prelude::*;
use xmppsasl::codec::base64;
use xmppsasl::protocol::{Credentials, Mechanism, Message, Session, SessionState};
use xmppsasl::transport::{MemoryTransport, TransportEvent};
use xmppsasl::SaslError;

const HOST: &str = "example.com";

const SERVER_HEADER: &str = "<?xml version='1.0'?><stream:stream xmlns='jabber:client' \
    xmlns:stream='http://etherx.jabber.org/streams' id='c2s_123' from='example.com' version='1.0'>";

const FEATURES: &str = "<stream:features>\
    <mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
    <mechanism>PLAIN</mechanism>\
    <mechanism>DIGEST-MD5</mechanism>\
    <mechanism>X-OAUTH2</mechanism>\
    <mechanism>SCRAM-SHA-1</mechanism>\
    </mechanisms></stream:features>";

const DIGEST_CHALLENGE: &str = "<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
    bm9uY2U9IjM0ODE5ODkxNDYyNDY2NTcyMjQiLHFvcD0iYXV0aCIsY2hhcnNldD11dGYtOCxhbGdvcml0aG09bWQ1LXNlc3M=\
    </challenge>";

fn new_session() -> Session {
    Session::new(Credentials::new(HOST, "test", "secret"))
}

fn data(bytes: &[u8]) -> TransportEvent {
    TransportEvent::DataReceived(Bytes::copy_from_slice(bytes))
}

/// Extract the base64 body of a non-self-closed `<auth>` element
fn auth_payload(auth: &[u8]) -> String {
    let xml = std::str::from_utf8(auth).unwrap();
    let start = xml.find('>').unwrap() + 1;
    let end = xml.rfind("</auth>").unwrap();
    xml[start..end].to_string()
}

/// Test the full scenario: connect, features, SCRAM-SHA-1 announcement
#[test]
fn test_connect_then_scram_announcement() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();

    assert_eq!(session.state(), SessionState::InitializeStream);
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    assert_eq!(transport.writes().len(), 1);
    assert_eq!(
        transport.writes()[0],
        Message::stream_header(HOST).into_bytes()
    );
    assert_eq!(session.state(), SessionState::SelectAuthenticationMechanism);

    let challenges = session
        .dispatch(data(FEATURES.as_bytes()), &mut transport)
        .unwrap();
    assert!(challenges.is_empty());
    assert_eq!(transport.writes().len(), 2);
    assert_eq!(session.state(), SessionState::DecodeBase64Challenge);
    assert_eq!(session.mechanism(), Some(Mechanism::Sha1));

    let auth = &transport.writes()[1];
    assert!(auth.starts_with(
        b"<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='SCRAM-SHA-1'>"
    ));
    let payload = auth_payload(auth);
    assert_eq!(payload.len(), 60);

    let decoded = base64::decode(&payload).unwrap();
    assert!(decoded.starts_with(b"n,,n="));
    assert_eq!(
        decoded,
        format!("n,,n=test,r={}", session.nonce()).into_bytes()
    );
    assert!(!transport.is_disconnected());
}

/// Test the DIGEST-MD5 path through to a decoded challenge
#[test]
fn test_digest_md5_challenge() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();

    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();
    session
        .dispatch(
            data(
                b"<stream:features><mechanisms xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>\
                  <mechanism>DIGEST-MD5</mechanism><mechanism>PLAIN</mechanism>\
                  </mechanisms></stream:features>",
            ),
            &mut transport,
        )
        .unwrap();
    assert_eq!(
        transport.writes()[1],
        Bytes::from_static(b"<auth xmlns='urn:ietf:params:xml:ns:xmpp-sasl' mechanism='DIGEST-MD5'/>")
    );

    let challenges = session
        .dispatch(data(DIGEST_CHALLENGE.as_bytes()), &mut transport)
        .unwrap();
    assert_eq!(challenges.len(), 1);
    assert_eq!(
        challenges[0].as_str(),
        Some("nonce=\"3481989146246657224\",qop=\"auth\",charset=utf-8,algorithm=md5-sess")
    );
    assert_eq!(challenges[0].params()["qop"], "auth");
}

/// Test that features followed by unrelated bytes leave only those bytes
#[test]
fn test_excess_data_stays_buffered() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    let chunk = format!("{SERVER_HEADER}{FEATURES}<unrelated attr='1'>");
    session
        .dispatch(data(chunk.as_bytes()), &mut transport)
        .unwrap();

    assert_eq!(session.state(), SessionState::DecodeBase64Challenge);
    assert_eq!(session.buffered(), b"<unrelated attr='1'>");
}

/// Test that partial features never advance the session, however often data arrives
#[test]
fn test_stalled_features_never_advance() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    let partial = &FEATURES[..FEATURES.len() - 1];
    session
        .dispatch(data(partial.as_bytes()), &mut transport)
        .unwrap();
    for _ in 0..3 {
        session.dispatch(data(b""), &mut transport).unwrap();
        assert_eq!(session.state(), SessionState::SelectAuthenticationMechanism);
        assert_eq!(session.buffered(), partial.as_bytes());
    }
    assert_eq!(transport.writes().len(), 1);

    session.dispatch(data(b">"), &mut transport).unwrap();
    assert_eq!(session.state(), SessionState::DecodeBase64Challenge);
}

/// Test that a PLAIN-only server is refused and the transport torn down
#[test]
fn test_plain_only_server_is_refused() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    let result = session.dispatch(
        data(b"<stream:features><mechanisms><mechanism>PLAIN</mechanism></mechanisms></stream:features>"),
        &mut transport,
    );
    assert!(matches!(result, Err(SaslError::UnsupportedMechanism(_))));
    assert_eq!(transport.disconnects(), 1);
    assert_eq!(transport.writes().len(), 1);
    assert_eq!(session.state(), SessionState::Closed);
}

/// Test that a server failure after the announcement closes the session
#[test]
fn test_server_failure_closes_session() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();
    session
        .dispatch(data(FEATURES.as_bytes()), &mut transport)
        .unwrap();

    let result = session.dispatch(
        data(b"<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><invalid-mechanism/></failure>"),
        &mut transport,
    );
    assert!(matches!(result, Err(SaslError::Rejected(ref c)) if c == "invalid-mechanism"));
    assert!(transport.is_disconnected());
    assert!(session.is_closed());

    // A closed session refuses further input
    let result = session.dispatch(data(DIGEST_CHALLENGE.as_bytes()), &mut transport);
    assert!(matches!(result, Err(SaslError::InvalidState(_))));
}

const FAILURE: &str = "<failure xmlns='urn:ietf:params:xml:ns:xmpp-sasl'><aborted/></failure>";

/// Deliver `chunks` in order and report what the client side observed
fn run_chunks(chunks: &[&str]) -> (Vec<Bytes>, Vec<Vec<u8>>, usize, Option<String>) {
    let mut session = Session::with_nonce(
        Credentials::new(HOST, "test", "secret"),
        "0123456789abcdefghijABCDEFGHIJkl",
    );
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    let mut challenges = Vec::new();
    let mut error = None;
    for chunk in chunks {
        match session.dispatch(data(chunk.as_bytes()), &mut transport) {
            Ok(decoded) => challenges.extend(decoded.into_iter().map(|c| c.into_payload())),
            Err(err) => {
                error = Some(err.to_string());
                break;
            },
        }
    }
    let error = error.or_else(|| session.take_error().map(|err| err.to_string()));
    assert!(session.is_closed());
    (
        transport.writes().to_vec(),
        challenges,
        transport.disconnects(),
        error,
    )
}

/// Test that a failure behind features and a challenge loses neither
#[test]
fn test_failure_after_challenge_same_in_one_or_three_reads() {
    let challenge = "<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>Zm9v</challenge>";
    let whole = format!("{FEATURES}{challenge}{FAILURE}");

    let one = run_chunks(&[&whole]);
    let three = run_chunks(&[FEATURES, challenge, FAILURE]);

    assert_eq!(one, three);
    assert_eq!(one.0.len(), 2);
    assert_eq!(one.1, vec![b"foo".to_vec()]);
    assert_eq!(one.2, 1);
    assert!(one.3.unwrap().contains("aborted"));
}

/// Test that a challenge sharing a read with a failure is handed off first
#[test]
fn test_challenge_ahead_of_failure_is_delivered() {
    let mut session = new_session();
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();
    session
        .dispatch(data(FEATURES.as_bytes()), &mut transport)
        .unwrap();

    let challenges = session
        .dispatch(
            data(format!("{DIGEST_CHALLENGE}{FAILURE}").as_bytes()),
            &mut transport,
        )
        .unwrap();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].params()["qop"], "auth");
    assert_eq!(transport.disconnects(), 1);

    let result = session.dispatch(data(b""), &mut transport);
    assert!(matches!(result, Err(SaslError::Rejected(ref c)) if c == "aborted"));
    assert_eq!(transport.disconnects(), 1);
}

/// Run the whole server side through a session split at `split`
fn run_split(server: &[u8], split: usize) -> (SessionState, Vec<Bytes>, Vec<Vec<u8>>, Vec<u8>) {
    let mut session = Session::with_nonce(
        Credentials::new(HOST, "test", "secret"),
        "0123456789abcdefghijABCDEFGHIJkl",
    );
    let mut transport = MemoryTransport::new();
    session
        .dispatch(TransportEvent::Connected, &mut transport)
        .unwrap();

    let mut challenges = Vec::new();
    for chunk in [&server[..split], &server[split..]] {
        for challenge in session.dispatch(data(chunk), &mut transport).unwrap() {
            challenges.push(challenge.into_payload());
        }
    }
    (
        session.state(),
        transport.writes().to_vec(),
        challenges,
        session.buffered().to_vec(),
    )
}

/// Test chunk-boundary independence at every byte offset
#[test]
fn test_every_split_offset_matches_single_delivery() {
    let features = format!("{SERVER_HEADER}{FEATURES}");
    let expected = run_split(features.as_bytes(), features.len());

    for split in 0..=features.len() {
        assert_eq!(
            run_split(features.as_bytes(), split),
            expected,
            "split at {split}"
        );
    }
}

proptest! {
    /// Features and a challenge arriving in one stream, split anywhere
    #[test]
    fn prop_split_anywhere_after_features(split in 0usize..400) {
        let mut session = Session::with_nonce(
            Credentials::new(HOST, "test", "secret"),
            "0123456789abcdefghijABCDEFGHIJkl",
        );
        let mut transport = MemoryTransport::new();
        session.dispatch(TransportEvent::Connected, &mut transport).unwrap();
        session.dispatch(data(FEATURES.as_bytes()), &mut transport).unwrap();

        let server = format!("{DIGEST_CHALLENGE}<challenge xmlns='urn:ietf:params:xml:ns:xmpp-sasl'>cj1hYmM=</challenge>");
        let split = split.min(server.len());

        let mut payloads = Vec::new();
        for chunk in [&server.as_bytes()[..split], &server.as_bytes()[split..]] {
            for challenge in session.dispatch(data(chunk), &mut transport).unwrap() {
                payloads.push(challenge.into_payload());
            }
        }

        prop_assert_eq!(payloads.len(), 2);
        prop_assert_eq!(&payloads[1], &b"r=abc".to_vec());
        prop_assert!(session.buffered().is_empty());
        prop_assert_eq!(session.state(), SessionState::DecodeBase64Challenge);
    }
}
