pub mod dns;
pub mod rate_limiter;
pub mod tls;
pub mod whois;
