use crate::media::RemoteAudio;
use crate::peer::link::{LinkState, PeerLink};
use std::collections::VecDeque;
use walkie_core::{IceCandidate, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    /// Local offer sent, waiting for the answer.
    Offering,
    /// Both descriptions applied, waiting for connectivity.
    Answering,
    Connected,
    Closed,
}

/// Remote candidates wait here until a remote description is applied.
#[derive(Debug)]
pub enum IceGate {
    Pending(VecDeque<IceCandidate>),
    Open,
}

impl Default for IceGate {
    fn default() -> Self {
        Self::Pending(VecDeque::new())
    }
}

impl IceGate {
    /// Queues `candidate` while pending; hands it back once open.
    pub fn admit(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        match self {
            Self::Pending(queue) => {
                queue.push_back(candidate);
                None
            }
            Self::Open => Some(candidate),
        }
    }

    /// Opens the gate and returns queued candidates in arrival order.
    pub fn open(&mut self) -> VecDeque<IceCandidate> {
        match std::mem::replace(self, Self::Open) {
            Self::Pending(queue) => queue,
            Self::Open => VecDeque::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn pending(&self) -> usize {
        match self {
            Self::Pending(queue) => queue.len(),
            Self::Open => 0,
        }
    }
}

/// Negotiation state for one remote participant.
pub struct PeerRecord {
    pub remote_id: ParticipantId,
    pub state: NegotiationState,
    pub ice: IceGate,
    pub link: Box<dyn PeerLink>,
    pub playback: Option<RemoteAudio>,
    /// Last connectivity reported by the link.
    pub transport: LinkState,
}

impl PeerRecord {
    pub fn new(remote_id: ParticipantId, link: Box<dyn PeerLink>) -> Self {
        Self {
            remote_id,
            state: NegotiationState::New,
            ice: IceGate::default(),
            link,
            playback: None,
            transport: LinkState::New,
        }
    }
}
