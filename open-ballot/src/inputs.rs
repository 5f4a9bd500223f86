use serde::{Deserialize, Serialize};

use crate::dates::{date_to_unix, date_to_unix_in, validate_dates};
use crate::notification::{Notification, NotificationSink};
use crate::session::Section;
use crate::settings::Settings;
use crate::storage::PollParams;

pub const INPUTS_VALID_MSG: &str = "All information valid, click 'Create' to initialize poll.";

/// Raw poll creation form, dates as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollInputs {
    pub title: String,
    pub choices: [String; 3],
    pub start_date: String,
    pub end_date: String,
}

/// Validates the poll form and notifies the outcome through `sink`.
///
/// Outside of the creation section nothing is validated nor notified and `false` is returned.
pub fn process_poll_inputs(
    inputs: &PollInputs,
    section: Section,
    settings: &Settings,
    now: u64,
    sink: &impl NotificationSink,
) -> bool {
    if section != Section::Creation {
        return false;
    }
    match validate_poll_inputs(inputs, settings, now) {
        Ok(_) => {
            sink.notify(Notification::success(INPUTS_VALID_MSG));
            true
        }
        Err(n) => {
            sink.notify(n);
            false
        }
    }
}

/// Validates the poll form in the local timezone. First failing rule wins.
pub fn validate_poll_inputs(
    inputs: &PollInputs,
    settings: &Settings,
    now: u64,
) -> Result<PollParams, Notification> {
    validate_with(inputs, settings, now, date_to_unix)
}

/// Same as [`validate_poll_inputs`] with dates read in the given timezone.
pub fn validate_poll_inputs_in<Tz: chrono::TimeZone>(
    inputs: &PollInputs,
    settings: &Settings,
    now: u64,
    tz: &Tz,
) -> Result<PollParams, Notification> {
    validate_with(inputs, settings, now, |d| date_to_unix_in(d, tz))
}

fn validate_with(
    inputs: &PollInputs,
    settings: &Settings,
    now: u64,
    parse_date: impl Fn(&str) -> Option<u64>,
) -> Result<PollParams, Notification> {
    let fail = |msg: String| Err(Notification::error(msg));

    if inputs.title.is_empty() {
        return fail("Attention! Poll title is missing, please provide one.".into());
    }
    if inputs.title.len() > settings.max_title_bytes {
        return fail("Attention! Poll title too long, please shorten it.".into());
    }

    for (i, choice) in inputs.choices.iter().enumerate() {
        if choice.trim().is_empty() {
            return fail(format!(
                "Attention! Poll choice #{} is missing, please provide one.",
                i + 1
            ));
        }
        if choice.len() > settings.max_choice_bytes {
            return fail(format!(
                "Attention! Poll choice #{} too long, please shorten it.",
                i + 1
            ));
        }
    }

    if inputs.start_date.trim().is_empty() {
        return fail("Attention! Poll start date is missing, please provide one.".into());
    }
    if inputs.end_date.trim().is_empty() {
        return fail("Attention! Poll end date is missing, please provide one.".into());
    }

    let Some(start) = parse_date(&inputs.start_date) else {
        return fail("Invalid dates! Start date is not a valid date.".into());
    };
    let Some(end) = parse_date(&inputs.end_date) else {
        return fail("Invalid dates! End date is not a valid date.".into());
    };

    if let Err(e) = validate_dates(start, end, now, settings) {
        return fail(e.to_string());
    }

    Ok(PollParams {
        title: inputs.title.clone(),
        choices: inputs.choices.clone(),
        start_date_unix: start,
        end_date_unix: end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DAY, HOUR};
    use crate::dates::unix_to_date_in;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    const NOW: u64 = 1_737_124_245;

    fn color_poll(start: u64, end: u64) -> PollInputs {
        PollInputs {
            title: "Color?".into(),
            choices: ["Red".into(), "Blue".into(), "Green".into()],
            start_date: unix_to_date_in(start, &Utc),
            end_date: unix_to_date_in(end, &Utc),
        }
    }

    fn check(inputs: &PollInputs) -> Result<PollParams, String> {
        validate_poll_inputs_in(inputs, &Settings::default(), NOW, &Utc).map_err(|n| n.text)
    }

    #[test]
    fn color_scenario() {
        let params = check(&color_poll(NOW + DAY, NOW + 10 * DAY)).unwrap();
        assert_eq!(params.title, "Color?");
        assert_eq!(params.start_date_unix, NOW + DAY);
        assert_eq!(params.end_date_unix, NOW + 10 * DAY);
    }

    #[test]
    fn period_too_short() {
        assert_eq!(
            check(&color_poll(NOW + DAY, NOW + DAY + HOUR)),
            Err("Invalid dates! End date must be at least 3 days later than start date.".into())
        );
    }

    #[test]
    fn first_failure_wins() {
        let mut inputs = color_poll(NOW + 5 * DAY, NOW + DAY);
        inputs.title.clear();
        inputs.choices[1] = "   ".into();
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll title is missing, please provide one.".into())
        );

        inputs.title = "t".repeat(119);
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll title too long, please shorten it.".into())
        );

        inputs.title = "Color?".into();
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll choice #2 is missing, please provide one.".into())
        );

        inputs.choices[1] = "€".repeat(39);
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll choice #2 too long, please shorten it.".into())
        );

        inputs.choices[1] = "Blue".into();
        assert_eq!(
            check(&inputs),
            Err("Invalid dates! Start date must be earlier than end date.".into())
        );

        inputs.end_date = String::new();
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll end date is missing, please provide one.".into())
        );
        inputs.start_date = String::new();
        assert_eq!(
            check(&inputs),
            Err("Attention! Poll start date is missing, please provide one.".into())
        );
    }

    #[test]
    fn bad_dates() {
        let mut inputs = color_poll(NOW, NOW + 20 * DAY);
        assert_eq!(
            check(&inputs),
            Err("Invalid dates! Voting period must not exceed a maximum of 14 days.".into())
        );
        inputs.start_date = "tomorrow".into();
        assert_eq!(
            check(&inputs),
            Err("Invalid dates! Start date is not a valid date.".into())
        );
    }

    #[test]
    fn sink_and_section() {
        let seen = RefCell::new(Vec::new());
        let sink = |n: Notification| seen.borrow_mut().push(n);
        let s = Settings::default();
        let inputs = color_poll(NOW + DAY, NOW + 10 * DAY);

        assert!(!process_poll_inputs(&inputs, Section::Home, &s, NOW, &sink));
        assert!(seen.borrow().is_empty());

        let bad = PollInputs::default();
        assert!(!process_poll_inputs(&bad, Section::Creation, &s, NOW, &sink));
        let last = seen.borrow().last().cloned().unwrap();
        assert!(last.is_error());

        // the form dates are local time, keep the window far from any offset
        let local = PollInputs {
            start_date: crate::dates::unix_to_date(NOW + DAY),
            end_date: crate::dates::unix_to_date(NOW + 10 * DAY),
            ..inputs
        };
        assert!(process_poll_inputs(&local, Section::Creation, &s, NOW, &sink));
        assert_eq!(
            seen.borrow().last().cloned(),
            Some(Notification::success(INPUTS_VALID_MSG))
        );
    }
}
