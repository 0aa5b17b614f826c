#![allow(dead_code)]

use async_trait::async_trait;
use ip2loc_client::{LookupError, QueryTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Location fields used by every scripted response.
pub const SAMPLE_FIELDS: [&str; 6] = [
    "US",
    "UNITED STATES",
    "CALIFORNIA",
    "SAN FRANCISCO",
    "37.7749",
    "-122.4194",
];

/// One request frame captured by the mock, already split into fields.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub password: String,
    pub challenge: u32,
    pub ip_addr: String,
}

/// What the mock does on the next `recv_until` call.
pub enum RecvAction {
    /// Well-formed response echoing the nth captured request.
    EchoSent(usize),
    /// Echo the nth captured request's address with a fixed challenge.
    EchoWithChallenge(usize, u32),
    /// Deliver raw bytes as-is.
    Raw(Vec<u8>),
    /// Sleep, then continue with the next action in the same call.
    Delay(Duration),
    /// Report the would-block/timeout outcome, ending the round.
    EndRound,
    /// Report a hard transport failure.
    Fatal(&'static str),
}

#[derive(Default)]
struct MockState {
    sent: Vec<SentRequest>,
    script: VecDeque<RecvAction>,
    fail_sends_to: Vec<String>,
}

/// Scripted `QueryTransport`: captures request frames, replays a queue of
/// receive actions. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, action: RecvAction) {
        self.state.lock().unwrap().script.push_back(action);
    }

    pub fn enqueue_all(&self, actions: impl IntoIterator<Item = RecvAction>) {
        let mut state = self.state.lock().unwrap();
        state.script.extend(actions);
    }

    /// Make every send for `ip_addr` fail with a write error.
    pub fn fail_sends_to(&self, ip_addr: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_sends_to
            .push(ip_addr.to_string());
    }

    /// All captured request frames, in send order (failed sends included).
    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_for(&self, ip_addr: &str) -> Vec<SentRequest> {
        self.sent()
            .into_iter()
            .filter(|request| request.ip_addr == ip_addr)
            .collect()
    }

    fn response_for(&self, index: usize, challenge: Option<u32>) -> Vec<u8> {
        let sent = self.state.lock().unwrap().sent[index].clone();
        build_response(&sent.ip_addr, challenge.unwrap_or(sent.challenge), &SAMPLE_FIELDS)
    }
}

#[async_trait]
impl QueryTransport for MockTransport {
    async fn send(&self, payload: &[u8]) -> Result<(), LookupError> {
        let text = std::str::from_utf8(payload).expect("request frames are UTF-8");
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines.len(), 5, "request must be 4 fields plus trailing newline");
        assert_eq!(lines[0], "ip2locRequest");
        let challenge_hex = lines[2]
            .strip_prefix("getLocationForIP:")
            .expect("challenge line prefix");
        let request = SentRequest {
            password: lines[1].to_string(),
            challenge: u32::from_str_radix(challenge_hex, 16).expect("hex challenge"),
            ip_addr: lines[3].to_string(),
        };

        let mut state = self.state.lock().unwrap();
        let fail = state.fail_sends_to.contains(&request.ip_addr);
        let ip_addr = request.ip_addr.clone();
        state.sent.push(request);
        if fail {
            return Err(LookupError::WriteFailure(format!(
                "scripted send failure for {ip_addr}"
            )));
        }
        Ok(())
    }

    async fn recv_until(&self, _deadline: Instant) -> Result<Option<Vec<u8>>, LookupError> {
        loop {
            let action = self.state.lock().unwrap().script.pop_front();
            match action {
                None | Some(RecvAction::EndRound) => return Ok(None),
                Some(RecvAction::Delay(pause)) => tokio::time::sleep(pause).await,
                Some(RecvAction::Fatal(reason)) => {
                    return Err(LookupError::TransportFailure(reason.to_string()))
                }
                Some(RecvAction::Raw(bytes)) => return Ok(Some(bytes)),
                Some(RecvAction::EchoSent(index)) => {
                    return Ok(Some(self.response_for(index, None)))
                }
                Some(RecvAction::EchoWithChallenge(index, challenge)) => {
                    return Ok(Some(self.response_for(index, Some(challenge))))
                }
            }
        }
    }
}

/// A well-formed 11-field response frame.
pub fn build_response(ip_addr: &str, challenge: u32, fields: &[&str; 6]) -> Vec<u8> {
    format!(
        "ip2locResponse\ngetLocationForIP:{challenge:08x}\n{ip_addr}\n\n{}\n{}\n{}\n{}\n{}\n{}\n",
        fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]
    )
    .into_bytes()
}
