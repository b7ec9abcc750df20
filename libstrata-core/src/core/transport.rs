//! Process-group abstraction for inter-rank amplitude exchange.
//!
//! The interchange protocol and the measurement collectives speak to the
//! outside world through [`Transport`]. Every operation is collective and
//! lockstep: all ranks issue the same calls in the same order. Any failure
//! is fatal for the simulation; there is no partial-exchange recovery.

use std::sync::mpsc::{channel, Receiver, Sender};

use thiserror::Error;

use crate::maths::Amplitude;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} disconnected")]
    Disconnected(usize),

    #[error("unexpected message from peer {0}")]
    Protocol(usize),

    #[error("no peer with rank {0}")]
    NoPeer(usize),
}

pub trait Transport: Send {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Paired exchange with `partner`: sends `send`, fills `recv` with the
    /// partner's slice of the same length.
    fn exchange(
        &mut self,
        partner: usize,
        send: &[Amplitude],
        recv: &mut [Amplitude],
    ) -> Result<(), TransportError>;

    /// Gathers one value from every rank, indexed by rank.
    fn all_gather_f64(&mut self, value: f64) -> Result<Vec<f64>, TransportError>;

    /// Broadcasts `value` from `root`; returns the root's value on every rank.
    fn broadcast_u64(&mut self, root: usize, value: u64) -> Result<u64, TransportError>;
}

/// The trivial group: one process owning the whole state.
pub struct SingleProcess;

impl Transport for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn exchange(
        &mut self,
        partner: usize,
        _send: &[Amplitude],
        _recv: &mut [Amplitude],
    ) -> Result<(), TransportError> {
        Err(TransportError::NoPeer(partner))
    }

    fn all_gather_f64(&mut self, value: f64) -> Result<Vec<f64>, TransportError> {
        Ok(vec![value])
    }

    fn broadcast_u64(&mut self, _root: usize, value: u64) -> Result<u64, TransportError> {
        Ok(value)
    }
}

enum Message {
    Amplitudes(Vec<Amplitude>),
    Scalar(f64),
    Word(u64),
}

struct Peer {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

/// An in-process group: one endpoint per rank, pairwise channels between
/// all ranks. Ranks typically run on threads in lockstep.
pub struct ChannelGroup {
    rank: usize,
    peers: Vec<Option<Peer>>,
}

impl ChannelGroup {
    /// Builds a fully connected group of `size` endpoints.
    pub fn connected(size: usize) -> Vec<ChannelGroup> {
        let mut txs: Vec<Vec<Option<Sender<Message>>>> = (0..size)
            .map(|_| (0..size).map(|_| None).collect())
            .collect();
        let mut rxs: Vec<Vec<Option<Receiver<Message>>>> = (0..size)
            .map(|_| (0..size).map(|_| None).collect())
            .collect();

        for from in 0..size {
            for to in 0..size {
                if from == to {
                    continue;
                }
                let (tx, rx) = channel();
                txs[from][to] = Some(tx);
                rxs[to][from] = Some(rx);
            }
        }

        txs.into_iter()
            .zip(rxs)
            .enumerate()
            .map(|(rank, (tx_row, rx_row))| {
                let peers = tx_row
                    .into_iter()
                    .zip(rx_row)
                    .map(|pair| match pair {
                        (Some(tx), Some(rx)) => Some(Peer { tx, rx }),
                        _ => None,
                    })
                    .collect();
                ChannelGroup { rank, peers }
            })
            .collect()
    }

    fn peer(&self, rank: usize) -> Result<&Peer, TransportError> {
        self.peers
            .get(rank)
            .and_then(|p| p.as_ref())
            .ok_or(TransportError::NoPeer(rank))
    }

    fn send(&self, to: usize, message: Message) -> Result<(), TransportError> {
        self.peer(to)?
            .tx
            .send(message)
            .map_err(|_| TransportError::Disconnected(to))
    }

    fn recv(&self, from: usize) -> Result<Message, TransportError> {
        self.peer(from)?
            .rx
            .recv()
            .map_err(|_| TransportError::Disconnected(from))
    }
}

impl Transport for ChannelGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn exchange(
        &mut self,
        partner: usize,
        send: &[Amplitude],
        recv: &mut [Amplitude],
    ) -> Result<(), TransportError> {
        self.send(partner, Message::Amplitudes(send.to_vec()))?;
        match self.recv(partner)? {
            Message::Amplitudes(data) if data.len() == recv.len() => {
                recv.copy_from_slice(&data);
                Ok(())
            }
            _ => Err(TransportError::Protocol(partner)),
        }
    }

    fn all_gather_f64(&mut self, value: f64) -> Result<Vec<f64>, TransportError> {
        for to in 0..self.size() {
            if to != self.rank {
                self.send(to, Message::Scalar(value))?;
            }
        }
        let mut gathered = vec![0.0; self.size()];
        for from in 0..self.size() {
            if from == self.rank {
                gathered[from] = value;
            } else {
                match self.recv(from)? {
                    Message::Scalar(v) => gathered[from] = v,
                    _ => return Err(TransportError::Protocol(from)),
                }
            }
        }
        Ok(gathered)
    }

    fn broadcast_u64(&mut self, root: usize, value: u64) -> Result<u64, TransportError> {
        if self.rank == root {
            for to in 0..self.size() {
                if to != root {
                    self.send(to, Message::Word(value))?;
                }
            }
            Ok(value)
        } else {
            match self.recv(root)? {
                Message::Word(v) => Ok(v),
                _ => Err(TransportError::Protocol(root)),
            }
        }
    }
}
