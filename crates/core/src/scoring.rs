use crate::domain::portfolio::FundamentalsRecord;

/// Quality score bounds. ETFs and index instruments are never scored.
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

const BASELINE: f64 = 3.0;

/// Computes a fundamentals-based quality score in [1.0, 5.0], one decimal.
///
/// Pure function over the record's metric fields (`score` is ignored). Each
/// metric contributes an independent additive adjustment; within a metric only
/// the first matching band applies. Absent metrics arrive as 0.0 from the data
/// collaborator, which lands in the no-bonus band everywhere.
pub fn quality_score(record: &FundamentalsRecord) -> f64 {
    let mut score = BASELINE;

    if record.profit_margin > 0.20 {
        score += 0.5;
    } else if record.profit_margin > 0.10 {
        score += 0.3;
    } else if record.profit_margin < 0.0 {
        score -= 0.5;
    }

    // A P/E in a reasonable band is rewarded; extreme multiples are penalized.
    if record.pe_ratio > 10.0 && record.pe_ratio < 25.0 {
        score += 0.3;
    } else if record.pe_ratio > 50.0 {
        score -= 0.3;
    }

    if record.debt_to_equity < 50.0 {
        score += 0.4;
    } else if record.debt_to_equity > 150.0 {
        score -= 0.4;
    }

    if record.revenue_growth > 0.15 {
        score += 0.4;
    } else if record.revenue_growth < 0.0 {
        score -= 0.3;
    }

    if record.earnings_growth > 0.15 {
        score += 0.3;
    } else if record.earnings_growth < 0.0 {
        score -= 0.3;
    }

    ((score * 10.0).round() / 10.0).clamp(MIN_SCORE, MAX_SCORE)
}
