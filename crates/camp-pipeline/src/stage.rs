use std::fmt;
use std::str::FromStr;

use camp_core::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::codes;

/// Pipeline stages, in their only legal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate = 1,
    Execute = 2,
    Process = 3,
    Deliver = 4,
    Compare = 5,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Generate,
        Stage::Execute,
        Stage::Process,
        Stage::Deliver,
        Stage::Compare,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Execute => "execute",
            Stage::Process => "process",
            Stage::Deliver => "deliver",
            Stage::Compare => "compare",
        }
    }

    /// Stage whose artifacts this one consumes.
    pub fn producer(self) -> Option<Stage> {
        match self {
            Stage::Generate => None,
            Stage::Execute => Some(Stage::Generate),
            Stage::Process => Some(Stage::Execute),
            Stage::Deliver => Some(Stage::Process),
            Stage::Compare => Some(Stage::Deliver),
        }
    }

    /// Sorts and de-duplicates a requested stage set.
    pub fn ordered(stages: &[Stage]) -> Vec<Stage> {
        let mut ordered = stages.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered
    }

    /// Parses a comma-separated list such as `1,2,3` or `generate,execute`.
    pub fn parse_list(text: &str) -> Result<Vec<Stage>, CampError> {
        let stages = text
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Stage>, _>>()?;
        Ok(Self::ordered(&stages))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.number())
    }
}

impl FromStr for Stage {
    type Err = CampError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| text == stage.name() || text == stage.number().to_string())
            .ok_or_else(|| {
                CampError::Stage(
                    ErrorInfo::new(codes::UNKNOWN_STAGE, "unknown stage")
                        .with_context("stage", text)
                        .with_hint("use 1-5 or generate, execute, process, deliver, compare"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_stages_run_in_ascending_order() {
        assert_eq!(
            Stage::parse_list("4, process,1,4").expect("parse"),
            vec![Stage::Generate, Stage::Process, Stage::Deliver]
        );
        assert_eq!(
            Stage::parse_list("6").expect_err("bad").code(),
            codes::UNKNOWN_STAGE
        );
        assert_eq!(Stage::Compare.producer(), Some(Stage::Deliver));
    }
}
