//! Simulation scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// SIM-001: Open a wall, page through it, leave
    Browse,

    /// SIM-002: Hammer the wall with break/place/use actions
    Tamper,

    /// SIM-003: Real world changes underneath an open wall
    LiveRestore,

    /// SIM-004: Viewer walks off and changes world
    WalkAway,

    /// SIM-005: Background sweep plus registry shutdown
    Shutdown,

    /// SIM-006: Many viewers, tick thread and network threads at once
    Crowd,

    /// SIM-007: Encoded display queue with an incomplete palette
    Wire,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Browse,
            ScenarioId::Tamper,
            ScenarioId::LiveRestore,
            ScenarioId::WalkAway,
            ScenarioId::Shutdown,
            ScenarioId::Crowd,
            ScenarioId::Wire,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Browse => "browse",
            ScenarioId::Tamper => "tamper",
            ScenarioId::LiveRestore => "live_restore",
            ScenarioId::WalkAway => "walk_away",
            ScenarioId::Shutdown => "shutdown",
            ScenarioId::Crowd => "crowd",
            ScenarioId::Wire => "wire",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Browse => "Mount a 3-page wall, scroll past both ends, exit and verify restoration",
            ScenarioId::Tamper => "Random vetoed actions with client prediction; world must stay untouched",
            ScenarioId::LiveRestore => "World edits under the wall are suppressed, then revealed on exit",
            ScenarioId::WalkAway => "Distance sweep evicts only past the removal distance or on world change",
            ScenarioId::Shutdown => "Sweep task running; shutdown restores every wall and stops the task",
            ScenarioId::Crowd => "Concurrent viewers driven from several threads",
            ScenarioId::Wire => "Palette-encoded updates with unencodable wall surface falling back to air",
        }
    }

    /// True if the scenario drives the registry from more than one thread.
    pub fn is_concurrent(&self) -> bool {
        matches!(self, ScenarioId::Crowd)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "browse" | "sim-001" => Ok(ScenarioId::Browse),
            "tamper" | "sim-002" => Ok(ScenarioId::Tamper),
            "live_restore" | "liverestore" | "sim-003" => Ok(ScenarioId::LiveRestore),
            "walk_away" | "walkaway" | "sim-004" => Ok(ScenarioId::WalkAway),
            "shutdown" | "sim-005" => Ok(ScenarioId::Shutdown),
            "crowd" | "sim-006" => Ok(ScenarioId::Crowd),
            "wire" | "sim-007" => Ok(ScenarioId::Wire),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for scenario in ScenarioId::all() {
            assert_eq!(scenario.name().parse::<ScenarioId>(), Ok(scenario));
        }
        assert_eq!("SIM-004".parse::<ScenarioId>(), Ok(ScenarioId::WalkAway));
        assert!("split_brain".parse::<ScenarioId>().is_err());
    }
}
