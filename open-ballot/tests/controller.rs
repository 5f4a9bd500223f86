use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use cost::ONE_ALGO;
use open_ballot::constants::*;
use open_ballot::dates::unix_to_date;
use open_ballot::ext::{Clock, DeployTemplate, StateSchema};
use open_ballot::inputs::INPUTS_VALID_MSG;
use open_ballot::{
    check_btn_state, BallotController, BallotError, LedgerError, Notification, Section,
    SessionAction, Settings, UiButton,
};
use pretty_assertions::assert_eq;
use test_util::{fast_forward, gen_user_account, get_block_timestamp, setup, Keyring, MockLedger};

type Log = Arc<Mutex<Vec<Notification>>>;
type Controller = BallotController<MockLedger, Keyring, Box<dyn Fn(Notification) + Send + Sync>>;

fn init(ledger: &Arc<MockLedger>, wallet: &Arc<Keyring>) -> (Controller, Log) {
    let log: Log = Arc::default();
    let sink_log = log.clone();
    let sink: Box<dyn Fn(Notification) + Send + Sync> =
        Box::new(move |n| sink_log.lock().unwrap().push(n));
    let clock: Arc<dyn Clock> = ledger.clone();
    let ctr = BallotController::new(
        ledger.clone(),
        wallet.clone(),
        clock,
        Settings::default(),
        sink,
    );
    (ctr, log)
}

fn last_text(log: &Log) -> String {
    log.lock().unwrap().last().map(|n| n.text.clone()).unwrap_or_default()
}

fn fill_form(ctr: &mut Controller, now: u64) {
    ctr.dispatch(SessionAction::EditTitle("Color?".into()));
    for (index, value) in ["Red", "Blue", "Green"].into_iter().enumerate() {
        ctr.dispatch(SessionAction::EditChoice {
            index,
            value: value.into(),
        });
    }
    ctr.dispatch(SessionAction::EditStartDate(unix_to_date(now)));
    ctr.dispatch(SessionAction::EditEndDate(unix_to_date(now + 10 * DAY)));
}

#[tokio::test]
async fn flow1() -> anyhow::Result<()> {
    // 1. create a poll from the form
    // 2. a voter joins, requests box storage and votes
    // 3. after the voting period the creator purges and deletes the application
    let (ledger, wallet) = setup();
    let creator = gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let alice = gen_user_account(&ledger, &wallet, "alice", ONE_ALGO)?;
    let (mut ctr, log) = init(&ledger, &wallet);

    // nothing reaches the ledger without an account
    ctr.on_start();
    assert_matches!(ctr.on_create().await, Err(BallotError::NoActiveAccount));
    assert!(ledger.submitted_groups().is_empty());

    assert_eq!(ctr.on_connect().await?, creator);
    let now = get_block_timestamp(&ledger);
    fill_form(&mut ctr, now);
    assert!(ctr.session().poll_inputs_valid);
    assert_eq!(ctr.session().notification.text, INPUTS_VALID_MSG);
    assert!(!check_btn_state(UiButton::Create, &ctr.btn_flags()));

    let app_id = ctr.on_create().await?;
    assert_eq!(
        last_text(&log),
        format!("Poll created successfully! App ID: {app_id}")
    );
    assert_eq!(ctr.session().section, Section::Engagement);
    let p = ctr.participation();
    assert!(p.is_creator);
    assert!(p.has_box_storage);
    assert!(p.voting.open);
    let flags = ctr.btn_flags();
    assert!(check_btn_state(UiButton::RequestBox, &flags));
    assert!(check_btn_state(UiButton::Purge, &flags));
    assert!(!check_btn_state(UiButton::DeleteApp, &flags));

    // the creator can not request a second record
    assert_matches!(ctr.on_request_box().await, Err(BallotError::BoxStorageExists(_)));

    // switching accounts re-fetches the poll
    wallet.select(&alice)?;
    ctr.on_connect().await?;
    assert!(!ctr.session().stale);
    assert_eq!(ctr.session().snapshot.as_ref().unwrap().fetched_for, Some(alice));
    assert!(!ctr.participation().is_creator);
    assert_matches!(ctr.on_submit_vote().await, Err(BallotError::NoBoxStorage(_)));

    ctr.on_request_box().await?;
    assert!(ctr.participation().has_box_storage);
    assert_matches!(ctr.on_submit_vote().await, Err(BallotError::NoVoteChoice));
    ctr.dispatch(SessionAction::SelectChoice(2));
    ctr.on_submit_vote().await?;
    assert_eq!(last_text(&log), "Vote submitted successfully!");
    assert_eq!(ctr.participation().voted_for_index, Some(2));
    assert_eq!(ledger.global_uint(app_id, KEY_TOTAL_CHOICE2), Some(1));

    let submitted = ledger.submitted_groups().len();
    assert_matches!(ctr.on_submit_vote().await, Err(BallotError::AlreadyVoted(_)));
    assert_matches!(ctr.on_delete_app().await, Err(BallotError::Unauthorized(_)));
    assert_matches!(ctr.on_purge().await, Err(BallotError::Unauthorized(_)));
    assert_eq!(ledger.submitted_groups().len(), submitted);

    fast_forward(&ledger, 11 * DAY);
    wallet.select(&creator)?;
    ctr.on_connect().await?;
    assert!(!ctr.participation().voting.open);
    assert!(ctr.participation().able_to_purge);

    let report = ctr.on_purge().await?;
    assert_eq!(report.purged, 1);
    assert!(!ctr.participation().able_to_purge);
    assert_matches!(ctr.on_purge().await, Err(BallotError::NothingToPurge));

    ctr.on_delete_app().await?;
    assert!(!ledger.app_exists(app_id));
    assert_eq!(ctr.session().section, Section::Home);
    assert_eq!(ctr.session().active_account, Some(creator));
    assert_eq!(last_text(&log), format!("Application {app_id} deleted."));
    Ok(())
}

#[tokio::test]
async fn account_switch() -> anyhow::Result<()> {
    // 1. bob and alice allocate records, alice votes
    // 2. the wallet switches back to bob, whose own record is loaded
    // 3. bob can still vote
    let (ledger, wallet) = setup();
    gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let alice = gen_user_account(&ledger, &wallet, "alice", ONE_ALGO)?;
    let bob = gen_user_account(&ledger, &wallet, "bob", ONE_ALGO)?;
    let (mut ctr, _log) = init(&ledger, &wallet);
    ctr.on_connect().await?;
    ctr.on_start();
    fill_form(&mut ctr, get_block_timestamp(&ledger));
    let app_id = ctr.on_create().await?;

    wallet.select(&bob)?;
    ctr.on_connect().await?;
    ctr.on_request_box().await?;

    wallet.select(&alice)?;
    ctr.on_connect().await?;
    ctr.on_request_box().await?;
    ctr.dispatch(SessionAction::SelectChoice(2));
    ctr.on_submit_vote().await?;
    assert_eq!(ctr.participation().voted_for_index, Some(2));

    wallet.select(&bob)?;
    ctr.on_connect().await?;
    let p = ctr.participation();
    assert!(p.has_box_storage);
    assert!(!p.has_voted);
    assert_eq!(p.voted_for_index, None);
    assert!(!check_btn_state(UiButton::SubmitVote, &ctr.btn_flags()));
    assert_eq!(ctr.session().vote_choice, None);

    ctr.dispatch(SessionAction::SelectChoice(3));
    ctr.on_submit_vote().await?;
    assert_eq!(ctr.participation().voted_for_index, Some(3));
    assert_eq!(ledger.global_uint(app_id, KEY_TOTAL_VOTES), Some(2));

    // a failed re-fetch never shows the previous account's vote
    wallet.select(&alice)?;
    ledger.fail_next_read(LedgerError::Network("timeout".into()));
    ctr.on_connect().await?;
    assert!(ctr.session().stale);
    let p = ctr.participation();
    assert!(!p.has_voted);
    assert_eq!(p.voted_for_index, None);

    ctr.refresh().await?;
    assert_eq!(ctr.participation().voted_for_index, Some(2));
    Ok(())
}

#[tokio::test]
async fn failed_reload_keeps_success_message() -> anyhow::Result<()> {
    let (ledger, wallet) = setup();
    gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let alice = gen_user_account(&ledger, &wallet, "alice", ONE_ALGO)?;
    let (mut ctr, log) = init(&ledger, &wallet);
    ctr.on_connect().await?;
    ctr.on_start();
    fill_form(&mut ctr, get_block_timestamp(&ledger));
    ctr.on_create().await?;

    wallet.select(&alice)?;
    ctr.on_connect().await?;
    ctr.on_request_box().await?;
    ctr.dispatch(SessionAction::SelectChoice(1));

    ledger.fail_next_read(LedgerError::Network("timeout".into()));
    ctr.on_submit_vote().await?;
    assert_eq!(last_text(&log), "Vote submitted successfully!");
    assert!(!ctr.session().notification.is_error());
    assert!(ctr.session().stale);
    assert!(ctr.session().optimistic);
    assert_eq!(ctr.participation().voted_for_index, Some(1));

    ctr.refresh().await?;
    assert!(!ctr.session().stale);
    assert!(!ctr.session().optimistic);
    assert_eq!(ctr.participation().voted_for_index, Some(1));
    Ok(())
}

#[tokio::test]
async fn create_never_reuses_a_deployment() -> anyhow::Result<()> {
    let (ledger, wallet) = setup();
    let creator = gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let (mut ctr, _log) = init(&ledger, &wallet);
    ctr.on_connect().await?;

    // an earlier deployment carrying the version the next deploy stamps
    let earlier = ctr.manager().deploy_app(creator).await?.app_id;
    let now = get_block_timestamp(&ledger);
    ledger.set_template(
        earlier,
        DeployTemplate {
            app_name: APP_NAME.into(),
            version_unix: now,
            deletable: true,
            schema: StateSchema::OPEN_BALLOT,
        },
    );

    ctr.on_start();
    fill_form(&mut ctr, now);
    let app_id = ctr.on_create().await?;
    assert_ne!(app_id, earlier);
    assert_eq!(ledger.global_uint(app_id, KEY_POLL_FINALIZED), Some(1));
    assert_eq!(ledger.global_uint(earlier, KEY_POLL_FINALIZED), Some(0));
    Ok(())
}

#[tokio::test]
async fn voting_closed() -> anyhow::Result<()> {
    let (ledger, wallet) = setup();
    gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let bob = gen_user_account(&ledger, &wallet, "bob", ONE_ALGO)?;
    let (mut ctr, log) = init(&ledger, &wallet);
    ctr.on_connect().await?;
    ctr.on_start();
    fill_form(&mut ctr, get_block_timestamp(&ledger));
    let app_id = ctr.on_create().await?;

    wallet.select(&bob)?;
    ctr.on_connect().await?;
    ctr.on_join(app_id).await?;
    ctr.on_request_box().await?;
    ctr.dispatch(SessionAction::SelectChoice(1));

    fast_forward(&ledger, 11 * DAY);
    let submitted = ledger.submitted_groups().len();
    assert_matches!(ctr.on_submit_vote().await, Err(BallotError::VotingClosed));
    assert_eq!(last_text(&log), "Attention! Voting period is not open.");
    assert_eq!(ledger.submitted_groups().len(), submitted);
    assert_eq!(ledger.global_uint(app_id, KEY_TOTAL_VOTES), Some(0));

    // the record can still be deleted and refunded
    ctr.on_delete_box().await?;
    assert!(!ctr.participation().has_box_storage);
    Ok(())
}

#[tokio::test]
async fn remote_failure_is_generic() -> anyhow::Result<()> {
    let (ledger, wallet) = setup();
    gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let carol = gen_user_account(&ledger, &wallet, "carol", ONE_ALGO)?;
    let (mut ctr, log) = init(&ledger, &wallet);
    ctr.on_connect().await?;
    ctr.on_start();
    fill_form(&mut ctr, get_block_timestamp(&ledger));
    let app_id = ctr.on_create().await?;

    wallet.select(&carol)?;
    ctr.on_connect().await?;
    ctr.on_join(app_id).await?;

    // the application refuses new records once the period is over
    fast_forward(&ledger, 11 * DAY);
    let err = ctr.on_request_box().await.unwrap_err();
    assert_eq!(err.kind(), open_ballot::ErrorKind::Remote);
    assert_eq!(
        last_text(&log),
        "Box storage request failed! Please check your account and try again."
    );
    assert!(log.lock().unwrap().last().unwrap().is_error());
    assert!(!ctr.session().action_loading);

    ctr.dispatch(SessionAction::ActionStarted);
    assert_matches!(ctr.on_request_box().await, Err(BallotError::ActionInProgress));
    Ok(())
}

#[tokio::test]
async fn invalid_form() -> anyhow::Result<()> {
    let (ledger, wallet) = setup();
    gen_user_account(&ledger, &wallet, "creator", 10 * ONE_ALGO)?;
    let (mut ctr, log) = init(&ledger, &wallet);
    ctr.on_connect().await?;
    ctr.on_start();
    let now = get_block_timestamp(&ledger);
    fill_form(&mut ctr, now);
    ctr.dispatch(SessionAction::EditEndDate(unix_to_date(now + DAY)));
    assert!(!ctr.session().poll_inputs_valid);
    assert!(check_btn_state(UiButton::Create, &ctr.btn_flags()));

    let err = ctr.on_create().await.unwrap_err();
    assert_matches!(err, BallotError::InvalidPollInputs(_));
    let text = last_text(&log);
    assert!(text.contains("3 days"), "{text}");
    assert!(ledger.submitted_groups().is_empty());

    ctr.on_reset();
    assert_eq!(ctr.session().section, Section::Home);
    assert_eq!(ctr.session().notification, Notification::clear());
    Ok(())
}
