//! **TrackPool** — energy-tier partitions of the source playlist.
//!
//! Built once at startup from the playlist catalog and read-only afterwards.
//! Source playlists are assumed to ramp from calm openers to peak-hour
//! tracks, so the catalog is split into thirds: first third backs `Chill`,
//! second `Groove`, the rest `Party`.

use crate::types::PlaybackCategory;
use rand::seq::SliceRandom;
use rand::Rng;

/// A concrete instruction for the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelection {
    /// Play one specific track URI.
    Track(String),
    /// Jump to a random position inside a context (playlist) URI. Used when
    /// the catalog could not be expanded into individual tracks.
    ContextJump { context: String, offset: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct TrackPool {
    chill: Vec<String>,
    groove: Vec<String>,
    party: Vec<String>,
    /// Set when all we know is the playlist URI itself.
    context_only: Option<String>,
}

impl TrackPool {
    /// Partition a catalog into tier pools. An empty catalog yields an empty
    /// pool (selection returns `None`); tiny catalogs leave later tiers
    /// backed by the whole catalog rather than empty.
    pub fn from_catalog(tracks: Vec<String>) -> Self {
        let third = (tracks.len() / 3).max(1);
        let chill: Vec<String> = tracks.iter().take(third).cloned().collect();
        let groove: Vec<String> = tracks.iter().skip(third).take(third).cloned().collect();
        let mut party: Vec<String> = tracks.iter().skip(2 * third).cloned().collect();
        if party.is_empty() {
            party = tracks.clone();
        }
        Self {
            chill,
            groove,
            party,
            context_only: None,
        }
    }

    /// Degenerate pool holding only the playlist context URI; every pick is
    /// a random-offset jump inside it.
    pub fn context_fallback(context_uri: impl Into<String>) -> Self {
        Self {
            context_only: Some(context_uri.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context_only.is_none()
            && self.chill.is_empty()
            && self.groove.is_empty()
            && self.party.is_empty()
    }

    fn tier(&self, category: PlaybackCategory) -> &[String] {
        match category {
            PlaybackCategory::Chill => &self.chill,
            PlaybackCategory::Groove => &self.groove,
            PlaybackCategory::Party => &self.party,
        }
    }

    /// Pick a track for the category. With more than one distinct candidate
    /// the pick always differs from `last`; with exactly one, repetition is
    /// allowed. Returns `None` only for a genuinely empty tier.
    pub fn pick<R: Rng>(
        &self,
        category: PlaybackCategory,
        last: Option<&str>,
        rng: &mut R,
    ) -> Option<TrackSelection> {
        if let Some(context) = &self.context_only {
            return Some(TrackSelection::ContextJump {
                context: context.clone(),
                offset: rng.gen_range(0..100),
            });
        }
        let pool = self.tier(category);
        if pool.is_empty() {
            return None;
        }
        if pool.len() == 1 {
            return Some(TrackSelection::Track(pool[0].clone()));
        }
        let fresh: Vec<&String> = pool
            .iter()
            .filter(|track| Some(track.as_str()) != last)
            .collect();
        let picked: &String = if fresh.is_empty() {
            // Every candidate equals the previous pick; dedupe concedes.
            pool.choose(rng)?
        } else {
            fresh.choose(rng).copied()?
        };
        Some(TrackSelection::Track(picked.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn uris(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("spotify:track:{}", i)).collect()
    }

    #[test]
    fn catalog_splits_into_thirds() {
        let pool = TrackPool::from_catalog(uris(9));
        assert_eq!(pool.chill.len(), 3);
        assert_eq!(pool.groove.len(), 3);
        assert_eq!(pool.party.len(), 3);
        assert_eq!(pool.chill[0], "spotify:track:0");
        assert_eq!(pool.party[0], "spotify:track:6");
    }

    #[test]
    fn tiny_catalog_backs_party_with_everything() {
        let pool = TrackPool::from_catalog(uris(2));
        assert_eq!(pool.chill.len(), 1);
        assert_eq!(pool.groove.len(), 1);
        assert_eq!(pool.party.len(), 2);
    }

    #[test]
    fn consecutive_picks_never_repeat_with_alternatives() {
        let pool = TrackPool::from_catalog(uris(9));
        let mut rng = StdRng::seed_from_u64(7);
        let mut last: Option<String> = None;
        for _ in 0..50 {
            let picked = pool
                .pick(PlaybackCategory::Party, last.as_deref(), &mut rng)
                .unwrap();
            let TrackSelection::Track(uri) = picked else {
                panic!("expected a concrete track");
            };
            assert_ne!(Some(uri.as_str()), last.as_deref());
            last = Some(uri);
        }
    }

    #[test]
    fn singleton_tier_allows_repetition() {
        let pool = TrackPool::from_catalog(uris(3));
        let mut rng = StdRng::seed_from_u64(7);
        let first = pool
            .pick(PlaybackCategory::Chill, None, &mut rng)
            .unwrap();
        let TrackSelection::Track(uri) = first else {
            panic!("expected a concrete track");
        };
        let second = pool
            .pick(PlaybackCategory::Chill, Some(&uri), &mut rng)
            .unwrap();
        assert_eq!(second, TrackSelection::Track(uri));
    }

    #[test]
    fn empty_catalog_yields_no_selection() {
        let pool = TrackPool::from_catalog(Vec::new());
        let mut rng = StdRng::seed_from_u64(7);
        assert!(pool.is_empty());
        assert!(pool.pick(PlaybackCategory::Groove, None, &mut rng).is_none());
    }

    #[test]
    fn context_fallback_jumps_inside_the_playlist() {
        let pool = TrackPool::context_fallback("spotify:playlist:abc");
        let mut rng = StdRng::seed_from_u64(7);
        match pool.pick(PlaybackCategory::Party, None, &mut rng).unwrap() {
            TrackSelection::ContextJump { context, offset } => {
                assert_eq!(context, "spotify:playlist:abc");
                assert!(offset < 100);
            }
            other => panic!("expected a context jump, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_only_pool_does_not_spin() {
        // Every candidate equals the previous pick; dedupe must concede.
        let pool = TrackPool {
            party: vec!["spotify:track:x".into(), "spotify:track:x".into()],
            ..TrackPool::default()
        };
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pool
            .pick(PlaybackCategory::Party, Some("spotify:track:x"), &mut rng)
            .unwrap();
        assert_eq!(picked, TrackSelection::Track("spotify:track:x".into()));
    }
}
