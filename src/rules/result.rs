use std::fmt;

/// Why a condition did not succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureType {
    Unknown,
    ConditionFailed,
    TypeMismatched,
    MissingOperator,
    InvalidOperand,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureType::Unknown => "UNKNOWN",
            FailureType::ConditionFailed => "CONDITION_FAILED",
            FailureType::TypeMismatched => "TYPE_MISMATCHED",
            FailureType::MissingOperator => "MISSING_OPERATOR",
            FailureType::InvalidOperand => "INVALID_OPERAND",
        };
        f.write_str(name)
    }
}

/// A failed evaluation, carried as data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulesFailure {
    pub kind: FailureType,
    pub message: String,
}

impl RulesFailure {
    pub fn new(kind: FailureType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RulesFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RulesFailure {}

/// `Ok(())` when the condition holds.
pub type RulesResult = Result<(), RulesFailure>;
