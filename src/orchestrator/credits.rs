//! Credit cost of a run.

use super::types::ArchiveOptions;

const BASE_CREDITS: u32 = 1;
const AI_CREDITS: u32 = 2;
const DEEP_RESEARCH_CREDITS: u32 = 4;

/// Credits charged for a completed archive. Depends only on the requested
/// enrichments; turning one on never lowers the cost.
pub fn credits_for(options: &ArchiveOptions) -> u32 {
    let mut credits = BASE_CREDITS;
    if options.enable_ai {
        credits += AI_CREDITS;
    }
    if options.deep_research {
        credits += DEEP_RESEARCH_CREDITS;
    }
    credits
}
