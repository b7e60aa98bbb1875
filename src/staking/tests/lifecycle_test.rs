use pretty_assertions::assert_eq;

use super::ledger_test::{at, ledger_with_validator};
use crate::error::{AuthorizationError, PhaseError, StakingError, StateError, ValidationError};
use crate::staking::{
    Address, AssetClass, DelegationOperations, EpochManager, EpochSnapshot, JailWindow,
    ParameterUpdate, SlashingOperations, ValidatorOperations,
};

const OWNER: Address = Address([1u8; 32]);
const OPERATOR: Address = Address([2u8; 32]);
const GOVERNANCE: Address = Address([7u8; 32]);
const REPORTER: Address = Address([8u8; 32]);
const PRODUCER: Address = Address([9u8; 32]);
const ALICE: Address = Address([10u8; 32]);

#[test]
fn test_threshold_slashes_jail_for_duration() {
    let mut ledger = ledger_with_validator(&[(ALICE, 500)]);
    ledger
        .stake(&at(ALICE, 3), &OWNER, AssetClass::Native, 500)
        .unwrap();
    ledger
        .record_expected_blocks(&at(PRODUCER, 10), &[OPERATOR], &[240])
        .unwrap();

    for _ in 0..49 {
        assert_eq!(ledger.record_slash(&at(PRODUCER, 11), &OPERATOR).unwrap(), None);
    }
    let window = ledger.record_slash(&at(PRODUCER, 11), &OPERATOR).unwrap();
    assert_eq!(window, Some(JailWindow { from: 2, until: 3 }));

    assert!(ledger.is_candidate(&OWNER, 1).unwrap());
    assert!(!ledger.is_candidate(&OWNER, 2).unwrap());
    assert!(!ledger.is_candidate(&OWNER, 3).unwrap());
    assert!(ledger.is_candidate(&OWNER, 4).unwrap());

    assert_eq!(ledger.validator(&OWNER).unwrap().slash_count_at(1), 50);
    assert_eq!(ledger.validator(&OWNER).unwrap().expected_blocks_at(1), 240);

    let snapshot = ledger.transition_epoch(&at(PRODUCER, 19)).unwrap();
    assert_eq!(
        snapshot,
        EpochSnapshot {
            epoch: 2,
            current: Vec::new(),
            next: Vec::new(),
        }
    );
}

#[test]
fn test_transition_publishes_candidates_once() {
    let mut ledger = ledger_with_validator(&[(ALICE, 500)]);
    ledger
        .stake(&at(ALICE, 3), &OWNER, AssetClass::Native, 500)
        .unwrap();

    let snapshot = ledger.transition_epoch(&at(PRODUCER, 9)).unwrap();
    assert_eq!(snapshot.epoch, 1);
    assert_eq!(snapshot.current, vec![OPERATOR]);
    assert_eq!(snapshot.next, vec![OPERATOR]);
    assert_eq!(ledger.snapshot(1), Some(&snapshot));
    assert_eq!(ledger.head_epoch(), 1);

    let before = ledger.state().clone();
    let err = ledger.transition_epoch(&at(PRODUCER, 9)).unwrap_err();
    assert_eq!(err, StakingError::State(StateError::TransitionAlreadyApplied(0)));
    assert_eq!(ledger.state(), &before);
}

#[test]
fn test_block_accounting_phases() {
    let mut ledger = ledger_with_validator(&[]);

    let err = ledger
        .record_expected_blocks(&at(PRODUCER, 5), &[OPERATOR], &[10])
        .unwrap_err();
    assert_eq!(err, StakingError::Phase(PhaseError::OnlyFirstInterval(5)));

    let err = ledger.transition_epoch(&at(PRODUCER, 5)).unwrap_err();
    assert_eq!(err, StakingError::Phase(PhaseError::OnlyLastInterval(5)));

    let err = ledger
        .record_expected_blocks(&at(PRODUCER, 10), &[OPERATOR], &[10, 20])
        .unwrap_err();
    assert_eq!(
        err,
        StakingError::Validation(ValidationError::LengthMismatch { operators: 1, counts: 2 })
    );

    // one unknown operator rejects the whole batch
    let stranger = Address([42u8; 32]);
    let err = ledger
        .record_expected_blocks(&at(PRODUCER, 10), &[OPERATOR, stranger], &[10, 20])
        .unwrap_err();
    assert_eq!(err, StakingError::State(StateError::UnknownOperator(stranger)));
    assert_eq!(ledger.validator(&OWNER).unwrap().expected_blocks_at(1), 0);
}

#[test]
fn test_privileged_calls_check_caller() {
    let mut ledger = ledger_with_validator(&[]);

    let err = ledger
        .record_expected_blocks(&at(ALICE, 10), &[OPERATOR], &[10])
        .unwrap_err();
    assert_eq!(
        err,
        StakingError::Authorization(AuthorizationError::NotBlockProducer { caller: ALICE })
    );

    let err = ledger.transition_epoch(&at(ALICE, 9)).unwrap_err();
    assert_eq!(
        err,
        StakingError::Authorization(AuthorizationError::NotBlockProducer { caller: ALICE })
    );

    let err = ledger.record_slash(&at(ALICE, 11), &OPERATOR).unwrap_err();
    assert_eq!(
        err,
        StakingError::Authorization(AuthorizationError::NotSlashReporter { caller: ALICE })
    );
    assert_eq!(ledger.record_slash(&at(REPORTER, 11), &OPERATOR).unwrap(), None);
    assert_eq!(ledger.validator(&OWNER).unwrap().slash_count_at(1), 1);

    let err = ledger.punish_misbehavior(&at(PRODUCER, 11), &OPERATOR).unwrap_err();
    assert_eq!(
        err,
        StakingError::Authorization(AuthorizationError::NotSlashReporter { caller: PRODUCER })
    );
    let window = ledger.punish_misbehavior(&at(REPORTER, 11), &OPERATOR).unwrap();
    assert_eq!(window, Some(JailWindow { from: 2, until: 3 }));
    // already jailed from a later epoch
    assert_eq!(ledger.punish_misbehavior(&at(REPORTER, 12), &OPERATOR).unwrap(), None);
}

fn update(activation_epoch: u64, epoch_length: u64) -> ParameterUpdate {
    ParameterUpdate {
        activation_epoch,
        block_duration: 6,
        epoch_length,
        reward_rate: 2_000,
        candidacy_threshold: 100,
        jail_threshold: 50,
        jail_duration: 2,
        commission_cap: 5_000,
    }
}

#[test]
fn test_governance_schedules_parameters() {
    let mut ledger = ledger_with_validator(&[]);

    let err = ledger
        .schedule_parameters(&at(ALICE, 5), update(2, 20))
        .unwrap_err();
    assert_eq!(
        err,
        StakingError::Authorization(AuthorizationError::NotGovernance { caller: ALICE })
    );

    let err = ledger
        .schedule_parameters(&at(GOVERNANCE, 12), update(1, 20))
        .unwrap_err();
    assert_eq!(
        err,
        StakingError::Validation(ValidationError::PastActivation { target: 1, current: 1 })
    );

    let params = ledger
        .schedule_parameters(&at(GOVERNANCE, 5), update(2, 20))
        .unwrap();
    assert_eq!(params.activation_block, 20);
    assert_eq!(ledger.current_epoch(19), 1);
    assert_eq!(ledger.current_epoch(20), 2);
    assert_eq!(ledger.current_epoch(39), 2);
    assert_eq!(ledger.current_epoch(40), 3);
    assert_eq!(ledger.parameters_at(1).epoch_length, 10);
    assert_eq!(ledger.parameters_at(2).reward_rate, 2_000);

    // a second request before activation replaces the pending set
    let params = ledger
        .schedule_parameters(&at(GOVERNANCE, 6), update(3, 5))
        .unwrap();
    assert_eq!(params.activation_block, 30);
    assert_eq!(ledger.parameters_at(2).epoch_length, 10);
    assert_eq!(ledger.current_epoch(35), 4);
}

#[test]
fn test_far_future_activation_is_rejected() {
    let mut ledger = ledger_with_validator(&[]);
    let before = ledger.state().clone();

    let err = ledger
        .schedule_parameters(&at(GOVERNANCE, 5), update(u64::MAX, 10))
        .unwrap_err();
    assert!(matches!(
        err,
        StakingError::Validation(ValidationError::InvalidParameter(_))
    ));
    assert_eq!(ledger.state(), &before);
}
