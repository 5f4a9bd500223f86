use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const BASE_BTN_STYLE: &str = "btn w-36 h-14 justify-center rounded-md text-[24px] tracking-wide font-bold bg-yellow-300 m-2 border-[3px] border-black hover:border-[4px]";

/// Buttons of the poll UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiButton {
    Start,
    Join,
    Clear,
    Wallet,
    Cancel,
    Create,
    RequestBox,
    DeleteBox,
    Choices,
    SubmitVote,
    Purge,
    DeleteApp,
}

impl UiButton {
    pub const ALL: [UiButton; 12] = [
        UiButton::Start,
        UiButton::Join,
        UiButton::Clear,
        UiButton::Wallet,
        UiButton::Cancel,
        UiButton::Create,
        UiButton::RequestBox,
        UiButton::DeleteBox,
        UiButton::Choices,
        UiButton::SubmitVote,
        UiButton::Purge,
        UiButton::DeleteApp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UiButton::Start => "start",
            UiButton::Join => "join",
            UiButton::Clear => "clear",
            UiButton::Wallet => "wallet",
            UiButton::Cancel => "cancel",
            UiButton::Create => "create",
            UiButton::RequestBox => "requestBox",
            UiButton::DeleteBox => "deleteBox",
            UiButton::Choices => "choices",
            UiButton::SubmitVote => "submitVote",
            UiButton::Purge => "purge",
            UiButton::DeleteApp => "deleteApp",
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            UiButton::Start | UiButton::Join | UiButton::Clear | UiButton::Wallet | UiButton::Cancel
        )
    }
}

impl fmt::Display for UiButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown button `{0}`")]
pub struct UnknownButton(pub String);

impl FromStr for UiButton {
    type Err = UnknownButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UiButton::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| UnknownButton(s.to_owned()))
    }
}

/// Flags the enabled state of every button is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BtnStateFlags {
    #[serde(default)]
    pub action_loading: bool,
    #[serde(default)]
    pub is_creator: bool,
    #[serde(default)]
    pub has_box_storage: bool,
    #[serde(default)]
    pub vote_submitted: bool,
    #[serde(default)]
    pub poll_inputs_valid: bool,
    #[serde(default)]
    pub poll_voting_period_open: bool,
    #[serde(default, alias = "ableToPurgeBoxA_")]
    pub able_to_purge: bool,
}

/// Returns `true` when `button` must be disabled.
pub fn check_btn_state(button: UiButton, f: &BtnStateFlags) -> bool {
    match button {
        UiButton::Create => f.action_loading || !f.poll_inputs_valid,
        UiButton::RequestBox => f.action_loading || f.is_creator || f.has_box_storage,
        UiButton::DeleteBox => f.action_loading || f.is_creator || !f.has_box_storage,
        UiButton::Choices | UiButton::SubmitVote => {
            f.action_loading || !f.has_box_storage || f.vote_submitted || !f.poll_voting_period_open
        }
        UiButton::Purge => f.action_loading || !f.is_creator || !f.able_to_purge,
        UiButton::DeleteApp => f.action_loading || !f.is_creator,
        UiButton::Start | UiButton::Join | UiButton::Clear | UiButton::Wallet | UiButton::Cancel => {
            false
        }
    }
}

/// Same as [`check_btn_state`]; unknown names are never disabled.
pub fn check_btn_state_by_name(name: &str, flags: &BtnStateFlags) -> bool {
    name.parse()
        .map(|b| check_btn_state(b, flags))
        .unwrap_or(false)
}

pub fn btn_style(button: UiButton) -> String {
    match button {
        UiButton::Cancel => format!("{BASE_BTN_STYLE} hover:bg-red-500 hover:border-red-700"),
        _ => format!("{BASE_BTN_STYLE} hover:bg-green-500 hover:border-green-700"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Every combination of the 7 flags.
    fn all_flags() -> impl Iterator<Item = BtnStateFlags> {
        (0u8..128).map(|m| BtnStateFlags {
            action_loading: m & 1 != 0,
            is_creator: m & 2 != 0,
            has_box_storage: m & 4 != 0,
            vote_submitted: m & 8 != 0,
            poll_inputs_valid: m & 16 != 0,
            poll_voting_period_open: m & 32 != 0,
            able_to_purge: m & 64 != 0,
        })
    }

    #[test]
    fn permission_table() {
        for f in all_flags() {
            assert_eq!(
                check_btn_state(UiButton::Create, &f),
                f.action_loading || !f.poll_inputs_valid
            );
            assert_eq!(
                check_btn_state(UiButton::SubmitVote, &f),
                f.action_loading || !f.has_box_storage || f.vote_submitted || !f.poll_voting_period_open
            );
            assert_eq!(
                check_btn_state(UiButton::Choices, &f),
                check_btn_state(UiButton::SubmitVote, &f)
            );
            assert_eq!(
                check_btn_state(UiButton::RequestBox, &f),
                f.action_loading || f.is_creator || f.has_box_storage
            );
            assert_eq!(
                check_btn_state(UiButton::Purge, &f),
                f.action_loading || !f.is_creator || !f.able_to_purge
            );
            assert_eq!(
                check_btn_state(UiButton::DeleteApp, &f),
                f.action_loading || !f.is_creator
            );
            for b in UiButton::ALL.iter().filter(|b| b.is_navigation()) {
                assert!(!check_btn_state(*b, &f));
            }
        }
    }

    #[test]
    fn by_name() {
        let loading = BtnStateFlags {
            action_loading: true,
            ..Default::default()
        };
        assert!(check_btn_state_by_name("create", &loading));
        assert!(check_btn_state_by_name("deleteBox", &loading));
        assert!(!check_btn_state_by_name("optIn", &loading));
        assert!(!check_btn_state_by_name("", &loading));
        for b in UiButton::ALL {
            assert_eq!(b.to_string().parse::<UiButton>(), Ok(b));
        }
    }

    #[test]
    fn flags_json() {
        let f: BtnStateFlags =
            serde_json::from_str(r#"{"actionLoading": true, "ableToPurgeBoxA_": true}"#).unwrap();
        assert!(f.action_loading && f.able_to_purge && !f.is_creator);
        assert_matches!(
            serde_json::from_str::<BtnStateFlags>(r#"{"optedIn": true}"#),
            Err(_)
        );
    }

    #[test]
    fn styles() {
        assert!(btn_style(UiButton::Cancel).ends_with("hover:bg-red-500 hover:border-red-700"));
        assert!(btn_style(UiButton::Create).contains("hover:bg-green-500"));
    }
}
