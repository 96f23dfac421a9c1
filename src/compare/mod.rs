//! Frame comparison
//!
//! - `similarity` - masked correlation and L2 metrics
//! - `detector` - rising/falling edge detection over the similarity stream
//! - `worker` - the compare loop that drives splits

mod detector;
mod similarity;
pub(crate) mod worker;

pub use detector::{MatchDetector, MatchState};
pub use similarity::{masked_correlation, masked_l2, similarity};
