//! Deployment tracks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The deployment track a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Development track, rebuilt on every push.
    Dev,
    /// Release-candidate track.
    Rc,
    /// Production track shipped to the community.
    Release,
}

impl Environment {
    /// All environments, in queue-creation order.
    pub const ALL: [Self; 3] = [Self::Dev, Self::Rc, Self::Release];

    /// Returns the short key used in paths and log output.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Rc => "rc",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_display() {
        assert_eq!(Environment::Dev.to_string(), "dev");
        assert_eq!(Environment::Rc.to_string(), "rc");
        assert_eq!(Environment::Release.to_string(), "release");
    }

    #[test]
    fn test_environment_serialize() {
        let json = serde_json::to_string(&Environment::Rc).unwrap();
        assert_eq!(json, r#""rc""#);

        let back: Environment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Environment::Rc);
    }
}
