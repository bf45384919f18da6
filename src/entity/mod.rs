pub mod audit_logs;
pub mod league_members;
pub mod leagues;
pub mod rate_limits;
pub mod submissions;
pub mod trades;
pub mod users;
