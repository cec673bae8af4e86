//! Verification stages. A capture flows ingress -> normalizer -> allowlist
//! -> comparator (via resolver) and certificate -> synthesizer -> reporter.

pub mod allowlist;
pub mod certificate;
pub mod comparator;
pub mod ingress;
pub mod normalizer;
pub mod reporter;
pub mod resolver;
pub mod synthesizer;
