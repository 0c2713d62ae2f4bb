use serde::{Deserialize, Serialize};

use crate::value_objects::{DisplayName, EpochMillis};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: DisplayName,
    pub last_status: EpochMillis,
}

impl Participant {
    pub fn register(name: DisplayName, now: EpochMillis) -> Self {
        Self {
            name,
            last_status: now,
        }
    }

    /// 心跳刷新
    pub fn touch(&mut self, now: EpochMillis) {
        self.last_status = now;
    }

    /// 最后一次活动早于 `cutoff` 即视为离线。
    pub fn is_inactive_since(&self, cutoff: EpochMillis) -> bool {
        self.last_status < cutoff
    }
}
