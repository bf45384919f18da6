use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::audit_logs;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AuditQuery {
    pub actor_id: Option<Uuid>,
    pub entity: Option<String>,
    pub action: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Serialize, Debug)]
pub struct AuditPage {
    pub events: Vec<audit_logs::Model>,
    pub pagination: Pagination,
}
