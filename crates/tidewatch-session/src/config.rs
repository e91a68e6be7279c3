//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Limits applied by the [`SessionRegistry`](crate::SessionRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Maximum players in one session. Joins beyond this fail with
    /// [`SessionError::Full`](crate::SessionError::Full).
    pub max_players: usize,

    /// Display names longer than this (in characters) are truncated.
    pub max_name_len: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 15,
            max_name_len: 24,
        }
    }
}

impl GameConfig {
    /// Fixes values that would make the registry unusable.
    ///
    /// Both limits are raised to at least 1.
    pub fn validated(mut self) -> Self {
        if self.max_players == 0 {
            tracing::warn!("max_players is 0, raising to 1");
            self.max_players = 1;
        }
        if self.max_name_len == 0 {
            tracing::warn!("max_name_len is 0, raising to 1");
            self.max_name_len = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_config_default() {
        let config = GameConfig::default();
        assert_eq!(config.max_players, 15);
        assert_eq!(config.max_name_len, 24);
    }

    #[test]
    fn test_game_config_validated_raises_zero_limits() {
        let config = GameConfig {
            max_players: 0,
            max_name_len: 0,
        }
        .validated();
        assert_eq!(config.max_players, 1);
        assert_eq!(config.max_name_len, 1);
    }
}
