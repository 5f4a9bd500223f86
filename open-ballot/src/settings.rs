use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::SettingsError;
use crate::storage::MicroAlgos;

/// Validation limits and orchestration parameters of the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_title_bytes: usize,
    pub max_choice_bytes: usize,
    /// Minimum voting period in seconds.
    pub min_voting_period: u64,
    /// Maximum voting period in seconds.
    pub max_voting_period: u64,
    /// When set, poll start and end dates must not be in the past.
    pub require_future_dates: bool,
    pub purge_batch_size: usize,
    pub purge_batches_per_group: usize,
    pub set_poll_wait_rounds: u64,
    pub purge_wait_rounds: u64,
    pub wait_rounds: u64,
    pub app_name: String,
    pub app_fund_amount: MicroAlgos,
    pub box_mbr_amount: MicroAlgos,
}

/// JSON patch of [`Settings`]. Every field is optional, unknown fields are rejected.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_title_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_choice_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_voting_period: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_voting_period: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_future_dates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_batches_per_group: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_poll_wait_rounds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purge_wait_rounds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_rounds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_fund_amount: Option<MicroAlgos>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_mbr_amount: Option<MicroAlgos>,
}

impl Settings {
    /// Parses a [`SettingsView`] JSON document and applies it on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let view: SettingsView = serde_json::from_str(json)?;
        Settings::default().apply_changes(view)
    }

    /// Apply optionally provided changes to settings and validate the result.
    pub fn apply_changes(mut self, view: SettingsView) -> Result<Self, SettingsError> {
        if let Some(v) = view.max_title_bytes {
            self.max_title_bytes = v;
        }
        if let Some(v) = view.max_choice_bytes {
            self.max_choice_bytes = v;
        }
        if let Some(v) = view.min_voting_period {
            self.min_voting_period = v;
        }
        if let Some(v) = view.max_voting_period {
            self.max_voting_period = v;
        }
        if let Some(v) = view.require_future_dates {
            self.require_future_dates = v;
        }
        if let Some(v) = view.purge_batch_size {
            self.purge_batch_size = v;
        }
        if let Some(v) = view.purge_batches_per_group {
            self.purge_batches_per_group = v;
        }
        if let Some(v) = view.set_poll_wait_rounds {
            self.set_poll_wait_rounds = v;
        }
        if let Some(v) = view.purge_wait_rounds {
            self.purge_wait_rounds = v;
        }
        if let Some(v) = view.wait_rounds {
            self.wait_rounds = v;
        }
        if let Some(v) = view.app_name {
            self.app_name = v;
        }
        if let Some(v) = view.app_fund_amount {
            self.app_fund_amount = v;
        }
        if let Some(v) = view.box_mbr_amount {
            self.box_mbr_amount = v;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.min_voting_period > self.max_voting_period {
            return Err(SettingsError::Invalid(
                "minVotingPeriod must not exceed maxVotingPeriod",
            ));
        }
        if self.purge_batch_size == 0 || self.purge_batch_size > MAX_BOX_REFERENCES {
            return Err(SettingsError::Invalid("purgeBatchSize must be within 1..=8"));
        }
        if self.purge_batches_per_group == 0 || self.purge_batches_per_group > MAX_GROUP_SIZE {
            return Err(SettingsError::Invalid(
                "purgeBatchesPerGroup must be within 1..=16",
            ));
        }
        if self.set_poll_wait_rounds == 0 || self.purge_wait_rounds == 0 || self.wait_rounds == 0 {
            return Err(SettingsError::Invalid("confirmation budgets must be positive"));
        }
        if self.app_name.is_empty() {
            return Err(SettingsError::Invalid("appName must not be empty"));
        }
        Ok(())
    }

    pub fn min_voting_days(&self) -> u64 {
        self.min_voting_period / DAY
    }

    pub fn max_voting_days(&self) -> u64 {
        self.max_voting_period / DAY
    }
}

fn default_app_name() -> String {
    APP_NAME.to_owned()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_title_bytes: MAX_TITLE_BYTES,
            max_choice_bytes: MAX_CHOICE_BYTES,
            min_voting_period: MIN_VOTING_PERIOD,
            max_voting_period: MAX_VOTING_PERIOD,
            // later revisions of the poll form dropped the "not in the past" check
            require_future_dates: false,
            purge_batch_size: PURGE_BATCH_SIZE,
            purge_batches_per_group: PURGE_BATCHES_PER_GROUP,
            set_poll_wait_rounds: SET_POLL_WAIT_ROUNDS,
            purge_wait_rounds: PURGE_WAIT_ROUNDS,
            wait_rounds: DEFAULT_WAIT_ROUNDS,
            app_name: default_app_name(),
            app_fund_amount: cost::APP_FUND_MBR,
            box_mbr_amount: cost::BOX_A_MBR,
        }
    }
}

impl From<Settings> for SettingsView {
    fn from(s: Settings) -> Self {
        Self {
            max_title_bytes: Some(s.max_title_bytes),
            max_choice_bytes: Some(s.max_choice_bytes),
            min_voting_period: Some(s.min_voting_period),
            max_voting_period: Some(s.max_voting_period),
            require_future_dates: Some(s.require_future_dates),
            purge_batch_size: Some(s.purge_batch_size),
            purge_batches_per_group: Some(s.purge_batches_per_group),
            set_poll_wait_rounds: Some(s.set_poll_wait_rounds),
            purge_wait_rounds: Some(s.purge_wait_rounds),
            wait_rounds: Some(s.wait_rounds),
            app_name: Some(s.app_name),
            app_fund_amount: Some(s.app_fund_amount),
            box_mbr_amount: Some(s.box_mbr_amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.max_title_bytes, 118);
        assert_eq!(s.max_choice_bytes, 116);
        assert_eq!(s.min_voting_days(), 3);
        assert_eq!(s.max_voting_days(), 14);
        assert!(!s.require_future_dates);
        assert_eq!(s.app_fund_amount, 116_900);
        assert_eq!(s.box_mbr_amount, 16_900);
        assert_matches!(s.validate(), Ok(()));
    }

    #[test]
    fn apply_json_patch() {
        let s = Settings::from_json(r#"{"requireFutureDates": true, "purgeBatchSize": 4}"#).unwrap();
        assert!(s.require_future_dates);
        assert_eq!(s.purge_batch_size, 4);
        assert_eq!(s.purge_batches_per_group, 2);

        assert_eq!(Settings::from_json("{}").unwrap(), Settings::default());
    }

    #[test]
    fn reject_unknown_and_invalid() {
        assert_matches!(
            Settings::from_json(r#"{"maxTitleLen": 3}"#),
            Err(SettingsError::Json(_))
        );
        assert_matches!(
            Settings::from_json(r#"{"purgeBatchSize": 9}"#),
            Err(SettingsError::Invalid(_))
        );
        assert_matches!(
            Settings::from_json(r#"{"purgeBatchSize": 0}"#),
            Err(SettingsError::Invalid(_))
        );
        assert_matches!(
            Settings::from_json(r#"{"minVotingPeriod": 100, "maxVotingPeriod": 10}"#),
            Err(SettingsError::Invalid(_))
        );
        assert_matches!(
            Settings::from_json(r#"{"purgeWaitRounds": 0}"#),
            Err(SettingsError::Invalid(_))
        );
    }

    #[test]
    fn view_round_trip() {
        let view = SettingsView::from(Settings::default());
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(Settings::from_json(&json).unwrap(), Settings::default());
    }
}
