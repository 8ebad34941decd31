//! Data models for jobhound.

mod offer;
mod run;
mod search;

pub use offer::{JobOffer, OfferStatus};
pub use run::{RunErrorInfo, RunErrorKind, RunOutcome, RunReport};
pub use search::JobSearch;
