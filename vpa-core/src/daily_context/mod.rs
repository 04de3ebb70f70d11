//! Daily-Context Resolver — maps a higher-timeframe `ContextSnapshot` and a
//! signal's directional bias onto a `DominantAlignment`. Pure function, no
//! state; CTX-2 calls this per signal when the daily snapshot is available.

use crate::context::{ContextSnapshot, DominantAlignment, Trend};
use crate::rules::DirectionBias;

/// Resolve dominant alignment for one signal against a daily snapshot `daily`.
pub fn resolve(daily: &ContextSnapshot, direction_bias: DirectionBias) -> DominantAlignment {
    if matches!(daily.trend, Trend::Unknown | Trend::Range) {
        return DominantAlignment::Unknown;
    }

    let leading_word = leading_bias_word(direction_bias);
    match (leading_word, daily.trend) {
        (Some(LeadingWord::Bullish), Trend::Up) => DominantAlignment::With,
        (Some(LeadingWord::Bullish), Trend::Down) => DominantAlignment::Against,
        (Some(LeadingWord::Bearish), Trend::Down) => DominantAlignment::With,
        (Some(LeadingWord::Bearish), Trend::Up) => DominantAlignment::Against,
        _ => DominantAlignment::Unknown,
    }
}

enum LeadingWord {
    Bullish,
    Bearish,
}

/// Extract the leading word of a `DirectionBias`. `BearishOrWait` leads with
/// `BEARISH`; `Neutral` has no leading directional word.
fn leading_bias_word(bias: DirectionBias) -> Option<LeadingWord> {
    match bias {
        DirectionBias::Bullish => Some(LeadingWord::Bullish),
        DirectionBias::Bearish | DirectionBias::BearishOrWait => Some(LeadingWord::Bearish),
        DirectionBias::Neutral => None,
    }
}
