// Upload path: validation policy, the orchestrator that drives a review from
// file to stored record, and the multipart HTTP handlers.

pub mod handlers;
pub mod orchestrator;
pub mod validation;
