use std::collections::HashMap;

use plaza_core::grid::Position;

/// Monotonically increasing client-side time value. The caller picks the
/// unit (the defaults read naturally as milliseconds).
pub type Tick = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpolatorConfig {
    /// How long a reported move takes to play out on screen.
    pub window: Tick,
    /// Maximum time past a segment's end before it is dropped regardless of
    /// its moving flag. Bounds how long a silent peer glides.
    pub extrapolation_ceiling: Tick,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            window: 100,
            extrapolation_ceiling: 1000,
        }
    }
}

/// A smoothed position for one peer at some sampled tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerSample {
    pub x: f32,
    pub y: f32,
    pub moving: bool,
}

/// One in-flight motion between two reported positions. Replaced wholesale
/// on each report.
#[derive(Debug, Clone, Copy)]
struct Segment {
    from: (f32, f32),
    from_tick: Tick,
    to: (f32, f32),
    to_tick: Tick,
    moving: bool,
}

impl Segment {
    /// Stale segments are pruned on the next sample pass; the peer then
    /// holds its last position until a fresh report arrives.
    fn is_outdated(&self, now: Tick, ceiling: Tick) -> bool {
        (!self.moving && now > self.to_tick) || now > self.to_tick + ceiling
    }

    fn sample(&self, now: Tick) -> PeerSample {
        // Stationary targets snap once the window has elapsed, so a resting
        // peer never oscillates around its cell.
        if !self.moving && now >= self.to_tick {
            return PeerSample {
                x: self.to.0,
                y: self.to.1,
                moving: false,
            };
        }
        let progress = if self.to_tick <= self.from_tick {
            1.0
        } else {
            let elapsed = now.saturating_sub(self.from_tick) as f32;
            let span = (self.to_tick - self.from_tick) as f32;
            (elapsed / span).clamp(0.0, 1.0)
        };
        PeerSample {
            x: self.from.0 + progress * (self.to.0 - self.from.0),
            y: self.from.1 + progress * (self.to.1 - self.from.1),
            moving: self.moving,
        }
    }
}

struct Peer {
    /// Where the peer holds when it has no live segment.
    rest: (f32, f32),
    segment: Option<Segment>,
}

impl Peer {
    fn sample(&self, now: Tick) -> PeerSample {
        match &self.segment {
            Some(segment) => segment.sample(now),
            None => PeerSample {
                x: self.rest.0,
                y: self.rest.1,
                moving: false,
            },
        }
    }
}

/// Turns sparse, jittery movement reports for N remote peers into a smooth
/// position per peer at arbitrary sampling ticks. Independent per peer and
/// independent of any rendering framework.
pub struct MotionTracker {
    config: InterpolatorConfig,
    peers: HashMap<String, Peer>,
}

impl Default for MotionTracker {
    fn default() -> Self {
        Self::new(InterpolatorConfig::default())
    }
}

impl MotionTracker {
    pub fn new(config: InterpolatorConfig) -> Self {
        Self {
            config,
            peers: HashMap::new(),
        }
    }

    /// Record a movement report: the segment starts wherever the peer is
    /// currently rendered and reaches `target` one window from `now`. A
    /// report for an unknown peer creates it in place at `target`.
    pub fn report(&mut self, peer_id: &str, target: Position, moving: bool, now: Tick) {
        let target = (target.x as f32, target.y as f32);
        match self.peers.get_mut(peer_id) {
            Some(peer) => {
                let current = peer.sample(now);
                peer.segment = Some(Segment {
                    from: (current.x, current.y),
                    from_tick: now,
                    to: target,
                    to_tick: now + self.config.window,
                    moving,
                });
            },
            None => {
                self.peers.insert(
                    peer_id.to_string(),
                    Peer {
                        rest: target,
                        segment: Some(Segment {
                            from: target,
                            from_tick: now,
                            to: target,
                            to_tick: now + self.config.window,
                            moving,
                        }),
                    },
                );
            },
        }
    }

    /// Recompute every peer's position at `now`, pruning outdated segments
    /// as it goes. Pruned peers hold their last sampled position.
    pub fn sample(&mut self, now: Tick) -> Vec<(String, PeerSample)> {
        let ceiling = self.config.extrapolation_ceiling;
        let mut out = Vec::with_capacity(self.peers.len());
        for (id, peer) in &mut self.peers {
            let mut sampled = peer.sample(now);
            if let Some(segment) = peer.segment
                && segment.is_outdated(now, ceiling)
            {
                tracing::trace!(peer = %id, "Dropping outdated motion segment");
                peer.rest = (sampled.x, sampled.y);
                peer.segment = None;
                sampled.moving = false;
            }
            out.push((id.clone(), sampled));
        }
        out
    }

    /// Sample a single peer without pruning.
    pub fn position(&self, peer_id: &str, now: Tick) -> Option<PeerSample> {
        self.peers.get(peer_id).map(|p| p.sample(now))
    }

    /// Remove a departed peer entirely.
    pub fn forget(&mut self, peer_id: &str) {
        self.peers.remove(peer_id);
    }

    pub fn tracked(&self) -> usize {
        self.peers.len()
    }

    /// Whether the peer currently has a live (unpruned) segment.
    pub fn has_segment(&self, peer_id: &str) -> bool {
        self.peers
            .get(peer_id)
            .is_some_and(|p| p.segment.is_some())
    }
}
