// Candidate ↔ job matching.
// `scorer` holds the pure scoring and ranking; `handlers` exposes it over HTTP.

pub mod handlers;
pub mod scorer;
