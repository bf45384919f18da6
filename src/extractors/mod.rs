pub mod claims;
pub mod client_ip;
