use std::fmt;

/// Outcome of a rules load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RulesLoadReason {
    /// Empty or malformed URL, blank key, or missing asset
    InvalidSource,
    /// Bundle is not a zip, or has no root `rules.json`
    ZipExtractionFailed,
    CannotCreateTempDir,
    CannotStoreInTempDir,
    /// Server answered 304; previously cached rules are still current
    NotModified,
    /// Non-200 response, no response, or nothing cached
    NoData,
    Success,
}

impl fmt::Display for RulesLoadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RulesLoadReason::InvalidSource => "INVALID_SOURCE",
            RulesLoadReason::ZipExtractionFailed => "ZIP_EXTRACTION_FAILED",
            RulesLoadReason::CannotCreateTempDir => "CANNOT_CREATE_TEMP_DIR",
            RulesLoadReason::CannotStoreInTempDir => "CANNOT_STORE_IN_TEMP_DIR",
            RulesLoadReason::NotModified => "NOT_MODIFIED",
            RulesLoadReason::NoData => "NO_DATA",
            RulesLoadReason::Success => "SUCCESS",
        };
        f.write_str(name)
    }
}

/// Rules text plus the reason it is (or isn't) there.
///
/// `Success` always carries data; every other reason carries none.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RulesLoadResult {
    data: Option<String>,
    reason: RulesLoadReason,
}

impl RulesLoadResult {
    pub(crate) fn success(data: String) -> Self {
        Self {
            data: Some(data),
            reason: RulesLoadReason::Success,
        }
    }

    pub(crate) fn failure(reason: RulesLoadReason) -> Self {
        debug_assert_ne!(reason, RulesLoadReason::Success);
        Self { data: None, reason }
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn into_data(self) -> Option<String> {
        self.data
    }

    pub fn reason(&self) -> RulesLoadReason {
        self.reason
    }

    pub fn is_success(&self) -> bool {
        self.reason == RulesLoadReason::Success
    }
}
