//! Quality-of-service profiles attached to interface entries.
//!
//! The descriptor core treats a [`QosProfile`] as an opaque value: it is
//! built from a named preset plus optional per-policy overrides, compared
//! structurally during merges, and rendered for diagnostics. Nothing here
//! talks to a middleware.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error produced when a policy name or value cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QosError {
    #[error("unknown QoS preset '{0}'")]
    UnknownPreset(String),
    #[error("unknown QoS policy '{0}'")]
    UnknownPolicy(String),
    #[error("invalid value '{value}' for QoS policy '{policy}'")]
    InvalidValue { policy: String, value: String },
    #[error("depth cannot be combined with keep_all history")]
    DepthWithKeepAll,
}

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosReliability {
    SystemDefault,
    #[default]
    Reliable,
    BestEffort,
}

impl fmt::Display for QosReliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => write!(f, "System Default"),
            Self::Reliable => write!(f, "Reliable"),
            Self::BestEffort => write!(f, "Best Effort"),
        }
    }
}

impl FromStr for QosReliability {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system_default" => Ok(Self::SystemDefault),
            "reliable" => Ok(Self::Reliable),
            "best_effort" => Ok(Self::BestEffort),
            _ => Err(invalid("reliability", s)),
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosHistory {
    SystemDefault,
    KeepLast(usize),
    KeepAll,
}

impl Default for QosHistory {
    fn default() -> Self {
        Self::KeepLast(10)
    }
}

impl fmt::Display for QosHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => write!(f, "System Default"),
            Self::KeepLast(depth) => write!(f, "Keep Last ({})", depth),
            Self::KeepAll => write!(f, "Keep All"),
        }
    }
}

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosDurability {
    SystemDefault,
    TransientLocal,
    #[default]
    Volatile,
}

impl fmt::Display for QosDurability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => write!(f, "System Default"),
            Self::TransientLocal => write!(f, "Transient Local"),
            Self::Volatile => write!(f, "Volatile"),
        }
    }
}

impl FromStr for QosDurability {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system_default" => Ok(Self::SystemDefault),
            "transient_local" => Ok(Self::TransientLocal),
            "volatile" => Ok(Self::Volatile),
            _ => Err(invalid("durability", s)),
        }
    }
}

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QosLiveliness {
    SystemDefault,
    #[default]
    Automatic,
    ManualByTopic,
}

impl fmt::Display for QosLiveliness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SystemDefault => write!(f, "System Default"),
            Self::Automatic => write!(f, "Automatic"),
            Self::ManualByTopic => write!(f, "Manual by Topic"),
        }
    }
}

impl FromStr for QosLiveliness {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system_default" => Ok(Self::SystemDefault),
            "automatic" => Ok(Self::Automatic),
            "manual_by_topic" => Ok(Self::ManualByTopic),
            _ => Err(invalid("liveliness", s)),
        }
    }
}

/// A policy duration with nanosecond resolution.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct Duration {
    pub sec: u64,
    pub nsec: u64,
}

impl Duration {
    pub const INFINITE: Duration = Duration {
        sec: 9223372036,
        nsec: 854775807,
    };

    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            sec: nanos / 1_000_000_000,
            nsec: nanos % 1_000_000_000,
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Self::INFINITE
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INFINITE {
            write!(f, "Infinite")
        } else if self.nsec == 0 {
            write!(f, "{}s", self.sec)
        } else {
            write!(f, "{}s {}ns", self.sec, self.nsec)
        }
    }
}

impl FromStr for Duration {
    type Err = QosError;

    /// Parses a nanosecond count, or `infinite`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("infinite") {
            return Ok(Self::INFINITE);
        }
        trimmed
            .parse::<u64>()
            .map(Self::from_nanos)
            .map_err(|_| invalid("duration", s))
    }
}

/// Named starting points for a [`QosProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QosPreset {
    SystemDefault,
    ServicesDefault,
    ActionStatusDefault,
    SensorData,
    ParameterEvents,
    Parameters,
}

impl QosPreset {
    pub const ALL: [QosPreset; 6] = [
        QosPreset::SystemDefault,
        QosPreset::ServicesDefault,
        QosPreset::ActionStatusDefault,
        QosPreset::SensorData,
        QosPreset::ParameterEvents,
        QosPreset::Parameters,
    ];

    /// The key used for this preset in descriptor documents.
    pub fn key(self) -> &'static str {
        match self {
            Self::SystemDefault => "system_default",
            Self::ServicesDefault => "services_default",
            Self::ActionStatusDefault => "action_status_default",
            Self::SensorData => "sensor_data",
            Self::ParameterEvents => "parameter_events",
            Self::Parameters => "parameters",
        }
    }

    pub fn profile(self) -> QosProfile {
        let base = QosProfile::default();
        match self {
            Self::SystemDefault => QosProfile {
                reliability: QosReliability::SystemDefault,
                durability: QosDurability::SystemDefault,
                history: QosHistory::SystemDefault,
                liveliness: QosLiveliness::SystemDefault,
                ..base
            },
            Self::ServicesDefault => base,
            Self::ActionStatusDefault => QosProfile {
                durability: QosDurability::TransientLocal,
                history: QosHistory::KeepLast(1),
                ..base
            },
            Self::SensorData => QosProfile {
                reliability: QosReliability::BestEffort,
                history: QosHistory::KeepLast(5),
                ..base
            },
            Self::ParameterEvents | Self::Parameters => QosProfile {
                history: QosHistory::KeepLast(1000),
                ..base
            },
        }
    }
}

impl FromStr for QosPreset {
    type Err = QosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.key() == wanted)
            .ok_or_else(|| QosError::UnknownPreset(s.to_string()))
    }
}

impl fmt::Display for QosPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Policy attribute names accepted on a `<qos>` element.
pub const QOS_POLICIES: &[&str] = &[
    "history",
    "depth",
    "reliability",
    "durability",
    "liveliness",
    "deadline",
    "lifespan",
    "liveliness_lease_duration",
    "avoid_ros_namespace_conventions",
];

#[derive(Debug, Default, Hash, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct QosProfile {
    pub reliability: QosReliability,
    pub durability: QosDurability,
    pub history: QosHistory,
    pub deadline: Duration,
    pub lifespan: Duration,
    pub liveliness: QosLiveliness,
    pub liveliness_lease_duration: Duration,
    pub avoid_ros_namespace_conventions: bool,
}

impl fmt::Display for QosProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QoS({}, {}, {}",
            self.reliability, self.durability, self.history
        )?;
        if self.deadline != Duration::INFINITE {
            write!(f, ", deadline={}", self.deadline)?;
        }
        if self.lifespan != Duration::INFINITE {
            write!(f, ", lifespan={}", self.lifespan)?;
        }
        if self.liveliness != QosLiveliness::Automatic {
            write!(f, ", liveliness={}", self.liveliness)?;
        }
        if self.liveliness_lease_duration != Duration::INFINITE {
            write!(f, ", lease={}", self.liveliness_lease_duration)?;
        }
        write!(f, ")")
    }
}

impl QosProfile {
    /// Applies a single `<qos>` policy attribute on top of this profile.
    ///
    /// `history` must be applied before `depth` for a `keep_all` history to be
    /// rejected in combination with a depth; [`QosProfile::apply_policies`]
    /// takes care of that ordering.
    pub fn apply_policy(&mut self, policy: &str, value: &str) -> Result<(), QosError> {
        match policy {
            "history" => {
                self.history = match value.trim().to_ascii_lowercase().as_str() {
                    "system_default" => QosHistory::SystemDefault,
                    "keep_all" => QosHistory::KeepAll,
                    "keep_last" => match self.history {
                        QosHistory::KeepLast(depth) => QosHistory::KeepLast(depth),
                        _ => QosHistory::default(),
                    },
                    _ => return Err(invalid(policy, value)),
                }
            }
            "depth" => {
                let depth = value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| invalid(policy, value))?;
                if self.history == QosHistory::KeepAll {
                    return Err(QosError::DepthWithKeepAll);
                }
                self.history = QosHistory::KeepLast(depth);
            }
            "reliability" => self.reliability = value.parse()?,
            "durability" => self.durability = value.parse()?,
            "liveliness" => self.liveliness = value.parse()?,
            "deadline" => self.deadline = parse_duration(policy, value)?,
            "lifespan" => self.lifespan = parse_duration(policy, value)?,
            "liveliness_lease_duration" => {
                self.liveliness_lease_duration = parse_duration(policy, value)?
            }
            "avoid_ros_namespace_conventions" => {
                self.avoid_ros_namespace_conventions =
                    crate::parse_bool(value).ok_or_else(|| invalid(policy, value))?
            }
            other => return Err(QosError::UnknownPolicy(other.to_string())),
        }
        Ok(())
    }

    /// Applies a set of policy overrides, `history` first.
    pub fn apply_policies<'a, I>(&mut self, policies: I) -> Result<(), QosError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut policies: Vec<_> = policies.into_iter().collect();
        policies.sort_by_key(|(name, _)| *name != "history");
        for (name, value) in policies {
            self.apply_policy(name, value)?;
        }
        Ok(())
    }
}

fn parse_duration(policy: &str, value: &str) -> Result<Duration, QosError> {
    value.parse().map_err(|_| invalid(policy, value))
}

fn invalid(policy: &str, value: &str) -> QosError {
    QosError::InvalidValue {
        policy: policy.to_string(),
        value: value.to_string(),
    }
}
