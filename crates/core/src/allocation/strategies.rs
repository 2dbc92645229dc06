use crate::domain::portfolio::{ScoredCandidate, WeightedAllocation};
use std::cmp::Ordering;

/// Share reserved for the sector ETF under the conservative strategy.
pub const ETF_BUFFER_WEIGHT: f64 = 0.40;

/// Per-holding ceiling applied to raw quality weights before normalization.
/// Normalization can perturb it slightly in either direction, so it is an
/// approximation of a 35% cap, not an exact post-rescale guarantee.
pub const CONCENTRATION_CAP: f64 = 0.35;

/// Diversification slice appended under the quality-weighted strategy when
/// ETFs are enabled and there is enough weight to carve it from.
pub const ETF_RESERVE_WEIGHT: f64 = 0.05;

/// Sorts candidates by score descending. The sort is stable, so ties keep
/// their insertion order (target first, then peers in discovery order).
pub fn rank(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Low-risk strategy: ETF buffer plus an equal split across top candidates.
///
/// With an ETF: 40% to the ETF, the remaining 60% split equally among the top
/// 4 candidates. Without: 100% split equally among the top 5. Fewer candidates
/// shrink the split; zero candidates leave the ETF line (if any) alone.
pub fn conservative(
    candidates: &[ScoredCandidate],
    etf_ticker: Option<&str>,
) -> Vec<WeightedAllocation> {
    let mut allocations = Vec::new();

    let (remaining, max_peers) = match etf_ticker {
        Some(etf) => {
            allocations.push(WeightedAllocation {
                ticker: etf.to_string(),
                weight: ETF_BUFFER_WEIGHT,
            });
            (1.0 - ETF_BUFFER_WEIGHT, 4)
        }
        None => (1.0, 5),
    };

    let peer_count = max_peers.min(candidates.len());
    if peer_count > 0 {
        let per_peer = remaining / peer_count as f64;
        for candidate in &candidates[..peer_count] {
            allocations.push(WeightedAllocation {
                ticker: candidate.ticker.clone(),
                weight: per_peer,
            });
        }
    }

    allocations
}

/// Medium-risk strategy: weights proportional to quality score.
///
/// The score total runs over the full candidate list; a zero total delegates
/// to [`conservative`]. Top-5 raw weights are capped at
/// [`CONCENTRATION_CAP`], then rescaled to 0.95 with a 5% ETF line appended
/// (when ETFs are enabled and the capped sum exceeds the reserve) or to 1.0
/// otherwise.
pub fn quality_weighted(
    candidates: &[ScoredCandidate],
    etf_ticker: Option<&str>,
) -> Vec<WeightedAllocation> {
    let total_score: f64 = candidates.iter().map(|c| c.score).sum();
    if total_score == 0.0 {
        return conservative(candidates, etf_ticker);
    }

    let mut allocations: Vec<WeightedAllocation> = candidates
        .iter()
        .take(5)
        .map(|candidate| WeightedAllocation {
            ticker: candidate.ticker.clone(),
            weight: (candidate.score / total_score).min(CONCENTRATION_CAP),
        })
        .collect();

    let total_allocated: f64 = allocations.iter().map(|a| a.weight).sum();

    match etf_ticker {
        Some(etf) if total_allocated > ETF_RESERVE_WEIGHT => {
            let scale = (1.0 - ETF_RESERVE_WEIGHT) / total_allocated;
            for allocation in &mut allocations {
                allocation.weight *= scale;
            }
            allocations.push(WeightedAllocation {
                ticker: etf.to_string(),
                weight: ETF_RESERVE_WEIGHT,
            });
        }
        _ => {
            for allocation in &mut allocations {
                allocation.weight /= total_allocated;
            }
        }
    }

    allocations
}

/// High-risk strategy: fixed conviction tiers, never renormalized.
///
/// 40% to the target (or the top-ranked candidate when the target has no
/// record), then 30% / 20% / 10% down the remaining ranks. With an ETF the
/// last tier splits into 7% + 3%. Missing tiers are simply omitted, so the
/// output sum can legitimately be below 1.0.
pub fn concentrated(
    candidates: &[ScoredCandidate],
    target_ticker: &str,
    etf_ticker: Option<&str>,
) -> Vec<WeightedAllocation> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let mut others: Vec<&ScoredCandidate> = candidates
        .iter()
        .filter(|c| c.ticker != target_ticker)
        .collect();

    let mut allocations = Vec::new();
    if others.len() < candidates.len() {
        allocations.push(WeightedAllocation {
            ticker: target_ticker.to_string(),
            weight: 0.40,
        });
    } else {
        // Target has no candidate entry: promote the top-ranked peer.
        allocations.push(WeightedAllocation {
            ticker: others[0].ticker.clone(),
            weight: 0.40,
        });
        others.remove(0);
    }

    if let Some(first) = others.first() {
        allocations.push(WeightedAllocation {
            ticker: first.ticker.clone(),
            weight: 0.30,
        });
    }
    if let Some(second) = others.get(1) {
        allocations.push(WeightedAllocation {
            ticker: second.ticker.clone(),
            weight: 0.20,
        });
    }
    if let Some(third) = others.get(2) {
        match etf_ticker {
            Some(etf) => {
                allocations.push(WeightedAllocation {
                    ticker: third.ticker.clone(),
                    weight: 0.07,
                });
                allocations.push(WeightedAllocation {
                    ticker: etf.to_string(),
                    weight: 0.03,
                });
            }
            None => {
                allocations.push(WeightedAllocation {
                    ticker: third.ticker.clone(),
                    weight: 0.10,
                });
            }
        }
    }

    allocations
}
