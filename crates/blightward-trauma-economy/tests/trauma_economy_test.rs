//! Integration tests for the Trauma Economy bounded context.

mod common;

use blightward_core::error::DomainError;
use blightward_core::repository::CharacterRepository;
use blightward_test_support::{MockDice, SequenceDice};
use blightward_trauma_economy::application::command_handlers::{
    handle_apply_stress, handle_process_damage, handle_process_party_rest, handle_process_rest,
    handle_resolve_breaking_point,
};
use blightward_trauma_economy::application::query_handlers::{
    get_journal, get_snapshot, get_trauma_economy_state,
};
use blightward_trauma_economy::domain::commands::{
    ApplyStress, ProcessDamage, ProcessPartyRest, ProcessRest, ResolveBreakingPoint,
};
use blightward_trauma_economy::domain::meter::Meter;
use blightward_trauma_economy::domain::orchestrator::{BreakingPointOutcome, DamageContext};
use blightward_trauma_economy::domain::stress::{RestType, StressSource};
use uuid::Uuid;

#[tokio::test]
async fn test_damage_breaking_point_and_rest_lifecycle() {
    // One pool roll with two successes passes the breaking-point check.
    let world = common::build_world(SequenceDice::new(vec![2]));
    let hero = common::character(95);
    world.seed(&hero);

    // Step 1: a 60-point hit pushes stress to the ceiling.
    let damage = handle_process_damage(
        &ProcessDamage {
            correlation_id: Uuid::new_v4(),
            character_id: hero.id,
            damage: 60,
            context: DamageContext::default(),
        },
        &world.services,
    )
    .await
    .unwrap();
    assert!(damage.result.trauma_check_triggered);
    let state = get_trauma_economy_state(hero.id, &world.services)
        .await
        .unwrap();
    assert!(state.stress.requires_trauma_check);

    // Step 2: the owed check passes and stress settles at 75.
    let resolved = handle_resolve_breaking_point(
        &ResolveBreakingPoint {
            correlation_id: Uuid::new_v4(),
            character_id: hero.id,
        },
        &world.services,
    )
    .await
    .unwrap();
    match resolved.result.outcome {
        BreakingPointOutcome::Resolved(resolution) => assert!(resolution.check.passed),
        other => panic!("expected Resolved, got {other:?}"),
    }
    assert_eq!(world.stored(hero.id).stress.value(), 75);

    // Step 3: a long rest recovers WILL x 5.
    handle_process_rest(
        &ProcessRest {
            correlation_id: Uuid::new_v4(),
            character_id: hero.id,
            rest: RestType::Long,
        },
        &world.services,
    )
    .await
    .unwrap();

    let saved = world.stored(hero.id);
    assert_eq!(saved.stress.value(), 60);
    assert!(saved.traumas.is_empty());
    assert_eq!(saved.version, 3);

    let sequence = world.sequence(hero.id);
    let expected: Vec<i64> = (1..=i64::try_from(sequence.len()).unwrap()).collect();
    assert_eq!(sequence, expected);
    assert_eq!(saved.journal_position, *expected.last().unwrap());

    let journal = get_journal(hero.id, &world.services).await.unwrap();
    assert_eq!(journal.len(), sequence.len());
    assert_eq!(journal[0].event_type, "trauma_economy.threshold_crossed");
}

#[tokio::test]
async fn test_party_rest_shares_frenzy_relief() {
    let world = common::build_world(MockDice);
    let mut berserker = common::character(50).with_rage();
    berserker.rage_mut().unwrap().meter = Meter::new(90);
    let scout = common::character(50);
    let healer = common::character(50);
    for member in [&berserker, &scout, &healer] {
        world.seed(member);
    }

    let outcome = handle_process_party_rest(
        &ProcessPartyRest {
            correlation_id: Uuid::new_v4(),
            member_ids: vec![berserker.id, scout.id, healer.id],
            rest: RestType::Long,
        },
        &world.services,
    )
    .await
    .unwrap();

    assert_eq!(outcome.result.len(), 3);
    for id in [berserker.id, scout.id, healer.id] {
        let member = world.stored(id);
        assert_eq!(member.stress.value(), 25);
        assert_eq!(member.version, 1);
    }
    assert_eq!(world.stored(berserker.id).rage().unwrap().meter.value(), 0);
}

#[tokio::test]
async fn test_concurrent_commands_on_one_character_serialize() {
    let world = common::build_world(MockDice);
    let hero = common::character(0);
    world.seed(&hero);

    let tasks = (0..10)
        .map(|_| {
            let services = world.services.clone();
            let command = ApplyStress {
                correlation_id: Uuid::new_v4(),
                character_id: hero.id,
                amount: 5,
                source: StressSource::Exploration,
                resist_dc: 0,
            };
            tokio::spawn(async move { handle_apply_stress(&command, &services).await })
        })
        .collect::<Vec<_>>();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let saved = world.stored(hero.id);
    assert_eq!(saved.stress.value(), 50);
    assert_eq!(saved.version, 10);
    let sequence = world.sequence(hero.id);
    let expected: Vec<i64> = (1..=i64::try_from(sequence.len()).unwrap()).collect();
    assert_eq!(sequence, expected);
}

#[tokio::test]
async fn test_stale_writer_gets_concurrency_conflict() {
    let world = common::build_world(MockDice);
    let hero = common::character(10);
    world.seed(&hero);
    let stale = world.characters.load(hero.id).await.unwrap();

    handle_apply_stress(
        &ApplyStress {
            correlation_id: Uuid::new_v4(),
            character_id: hero.id,
            amount: 20,
            source: StressSource::Narrative,
            resist_dc: 0,
        },
        &world.services,
    )
    .await
    .unwrap();

    match world.characters.save(&stale, stale.version).await {
        Err(DomainError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    assert_eq!(world.stored(hero.id).stress.value(), 30);
}

#[tokio::test]
async fn test_snapshot_after_damage_reports_rules_fingerprint() {
    let world = common::build_world(MockDice);
    let hero = common::character(0);
    world.seed(&hero);

    handle_process_damage(
        &ProcessDamage {
            correlation_id: Uuid::new_v4(),
            character_id: hero.id,
            damage: 100,
            context: DamageContext {
                critical_hit: true,
                ..DamageContext::default()
            },
        },
        &world.services,
    )
    .await
    .unwrap();

    let snapshot = get_snapshot(hero.id, &world.services).await.unwrap();
    assert!(snapshot.is_valid());
    assert!(snapshot.stress > 0);
    assert_eq!(
        snapshot.rules_fingerprint,
        world.services.orchestrator.content().fingerprint()
    );
}
