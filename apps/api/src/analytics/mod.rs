// Developer analytics: anomaly detection, growth forecasting, career progression.
// Pure computation lives in the submodules; `handlers` wires them to HTTP and the cache.

pub mod anomaly;
pub mod career;
pub mod forecast;
pub mod handlers;
pub mod series;
