use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

lazy_static! {
    static ref VALID_NAMES: String = {
        let mut valid: Vec<String> = MechanismKind::iter().map(|k| k.to_string()).collect();
        valid.sort();
        valid.join(", ")
    };
}

/// Learning rule of a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum MechanismKind {
    #[strum(to_string = "sr", serialize = "stimulus_response")]
    StimulusResponse,
    #[strum(to_string = "es", serialize = "expected_sarsa")]
    ExpectedSarsa,
    #[strum(to_string = "ql", serialize = "q_learning")]
    QLearning,
    #[strum(to_string = "ac", serialize = "actor_critic")]
    ActorCritic,
    #[strum(to_string = "ga", serialize = "enquist")]
    Enquist,
    #[strum(to_string = "rw", serialize = "original_rescorla_wagner")]
    RescorlaWagner,
    #[strum(to_string = "cm", serialize = "cognitive_map")]
    CognitiveMap,
}

impl MechanismKind {
    pub fn has_v(&self) -> bool {
        !matches!(self, MechanismKind::RescorlaWagner)
    }

    pub fn has_w(&self) -> bool {
        matches!(self, MechanismKind::ActorCritic | MechanismKind::Enquist)
    }

    pub fn has_vss(&self) -> bool {
        matches!(self, MechanismKind::RescorlaWagner)
    }

    /// Whether the rule supports the trace-weighted update.
    pub fn supports_trace(&self) -> bool {
        !matches!(
            self,
            MechanismKind::RescorlaWagner | MechanismKind::CognitiveMap
        )
    }

    /// Parses a mechanism name as written in a script.
    pub fn parse(name: &str) -> Result<Self, String> {
        name.trim().parse().map_err(|_| {
            format!(
                "Invalid mechanism name '{}'. Mechanism name must be one of the following: {}.",
                name.trim(),
                *VALID_NAMES
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!(MechanismKind::parse("sr"), Ok(MechanismKind::StimulusResponse));
        assert_eq!(MechanismKind::parse("GA"), Ok(MechanismKind::Enquist));
        assert_eq!(
            MechanismKind::parse("original_rescorla_wagner"),
            Ok(MechanismKind::RescorlaWagner)
        );
        assert_eq!(MechanismKind::parse("Q_Learning"), Ok(MechanismKind::QLearning));
        assert_eq!(MechanismKind::ExpectedSarsa.to_string(), "es");
    }

    #[test]
    fn test_invalid_name() {
        let err = MechanismKind::parse("foo").unwrap_err();
        assert_eq!(
            err,
            "Invalid mechanism name 'foo'. Mechanism name must be one of the following: ac, cm, es, ga, ql, rw, sr."
        );
    }

    #[test]
    fn test_capabilities() {
        assert!(MechanismKind::RescorlaWagner.has_vss());
        assert!(!MechanismKind::RescorlaWagner.has_v());
        assert!(MechanismKind::ActorCritic.has_w());
        assert!(!MechanismKind::QLearning.has_w());
    }
}
