use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Client,
    Collector,
    Office,
}

/// Explicit caller identity handed into every core call. The workflows never
/// read ambient state; whoever drives them says who they are.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl SessionContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Actor label recorded in the transition log.
    pub fn actor_label(&self) -> String {
        let role = match self.role {
            Role::Client => "CLIENT",
            Role::Collector => "COLLECTOR",
            Role::Office => "OFFICE",
        };
        format!("{}:{}", role, self.user_id)
    }
}
