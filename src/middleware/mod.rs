//! HTTP middleware: request tracing, security headers, client address extraction

mod client_ip;
mod security;
mod tracing;

pub use client_ip::{client_ip, ClientIp};
pub use security::{hsts_header, security_headers};
pub use self::tracing::{request_tracing, REQUEST_ID_HEADER};
