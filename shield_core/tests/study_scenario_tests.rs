mod common;

use common::{grants_context, study, user, AclSpy, MemoryRepository};
use serde_json::json;
use shield_core::{
    parse_auth_configs, AclBackend, AuthConfig, Entity, Record, RuleDefaults, ShieldOptions,
    ShieldRegistry,
};
use std::collections::BTreeMap;

const STUDY_SHIELD: &str = r#"
    [[shield]]
    [shield.defaults]
    model_name = "Study"
    auth_key = "id"
    acl_context_name = "study"
"#;

fn study_acl(spy: &AclSpy) -> AclBackend {
    AclBackend::new().with_context(
        "study",
        grants_context(
            spy,
            &[
                ("admin", "read_Study", "1"),
                ("admin", "update_Study", "1"),
                ("admin", "create_Study", "1"),
                ("admin", "delete_Study", "1"),
                ("pi", "read_Study", "1"),
            ],
        ),
    )
}

fn init(repo: &MemoryRepository, spy: &AclSpy) -> ShieldRegistry<MemoryRepository> {
    let mut models = BTreeMap::new();
    models.insert("Study".to_string(), repo.clone());

    ShieldRegistry::init(ShieldOptions {
        config: Some(parse_auth_configs(STUDY_SHIELD).unwrap()),
        acl: Some(study_acl(spy)),
        models,
    })
    .unwrap()
}

fn seeded() -> MemoryRepository {
    MemoryRepository::new().with_record(study(1).set("title", "Original"))
}

#[tokio::test]
async fn test_study_scenario() {
    let repo = seeded();
    let spy = AclSpy::default();
    let registry = init(&repo, &spy);
    let shield = registry.shield_for(&study(1)).unwrap();

    // both principals can read study 1
    let read = shield.read(&study(1), &user("admin"), &()).await.unwrap();
    assert_eq!(read.get("title"), Some(json!("Original")));
    assert!(shield.read(&study(1), &user("pi"), &()).await.is_ok());

    // pi passes the read check but not the update check
    let err = shield
        .update(&study(1).set("title", "By pi"), &user("pi"), &())
        .await
        .unwrap_err();
    assert!(err.is_denied());
    let message = err.to_string();
    assert!(message.contains("pi"));
    assert!(message.contains("update"));
    assert!(message.contains("`1`"));
    assert_eq!(repo.calls("save"), 0);

    // admin's update goes through with the caller's attributes
    let edited = study(1).set("title", "By admin");
    shield.update(&edited, &user("admin"), &()).await.unwrap();
    assert_eq!(repo.calls_with("save"), vec![edited]);
    assert_eq!(repo.stored(1).unwrap().get("title"), Some(json!("By admin")));
}

#[tokio::test]
async fn test_unknown_principal_cannot_read() {
    let repo = seeded();
    let spy = AclSpy::default();
    let shield = init(&repo, &spy).get("Study").unwrap().unwrap();

    let err = shield.read(&study(1), &user("otherPI"), &()).await.unwrap_err();
    assert!(err.is_denied());
    assert!(err.to_string().contains("otherPI cannot read"));

    let err = shield.delete(&study(1), &user("otherPI"), &()).await.unwrap_err();
    assert!(err.to_string().contains("cannot read"));
    assert!(repo.stored(1).is_some());
}

#[tokio::test]
async fn test_create_of_persisted_record_fails_regardless_of_acl() {
    let repo = seeded();
    let spy = AclSpy::default();
    let shield = init(&repo, &spy).get("Study").unwrap().unwrap();

    for principal in ["admin", "pi", "nobody"] {
        let err = shield
            .create(&study(1).set("title", "dup"), &user(principal), &())
            .await
            .unwrap_err();
        assert!(err.is_state());
        assert!(err.to_string().contains("exists"));
    }
    assert_eq!(spy.count(), 0);
}

#[tokio::test]
async fn test_admin_delete() {
    let repo = seeded();
    let spy = AclSpy::default();
    let shield = init(&repo, &spy).get("Study").unwrap().unwrap();

    let err = shield.delete(&study(1), &user("pi"), &()).await.unwrap_err();
    assert!(err.to_string().contains("pi cannot delete"));

    shield.delete(&study(1), &user("admin"), &()).await.unwrap();
    assert!(repo.stored(1).is_none());
}

#[test]
fn test_init_requires_acl_config_and_models() {
    let repo = MemoryRepository::new();
    let spy = AclSpy::default();
    let models = || BTreeMap::from([("Study".to_string(), repo.clone())]);
    let configs = || parse_auth_configs::<Record>(STUDY_SHIELD).unwrap();

    let cases = [
        ShieldOptions {
            config: Some(configs()),
            acl: None,
            models: models(),
        },
        ShieldOptions {
            config: None,
            acl: Some(study_acl(&spy)),
            models: models(),
        },
        ShieldOptions {
            config: Some(Vec::new()),
            acl: Some(study_acl(&spy)),
            models: models(),
        },
        ShieldOptions {
            config: Some(configs()),
            acl: Some(study_acl(&spy)),
            models: BTreeMap::new(),
        },
    ];

    for options in cases {
        let err = ShieldRegistry::init(options).err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Invalid shield options"));
    }
}

#[test]
fn test_registry_matches_configs_by_model_name() {
    let spy = AclSpy::default();
    let acl = study_acl(&spy).with_context("site", grants_context(&spy, &[]));
    let configs = vec![
        AuthConfig::new(RuleDefaults::new("Study", "study", "id")),
        AuthConfig::new(RuleDefaults::new("Study", "site", "site_id")),
        AuthConfig::new(RuleDefaults::new("Site", "site", "id")),
    ];
    let registry = ShieldRegistry::new(acl, configs);

    let studies = registry.guard("Study", MemoryRepository::new()).unwrap();
    let sites = registry.guard("Site", MemoryRepository::new()).unwrap();
    let visits = registry.guard("Visit", MemoryRepository::new()).unwrap();

    assert_eq!(studies.rules().len(), 8);
    assert_eq!(sites.rules().len(), 4);
    assert!(visits.rules().is_empty());
    assert_eq!(registry.names().unwrap(), vec!["Site", "Study", "Visit"]);
}

#[test]
fn test_registry_rejects_second_guard_and_tears_down() {
    let repo = seeded();
    let spy = AclSpy::default();
    let registry = init(&repo, &spy);

    let err = registry.guard("Study", MemoryRepository::new()).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("already guarded"));

    let held = registry.get("Study").unwrap().unwrap();
    registry.teardown().unwrap();
    assert!(registry.names().unwrap().is_empty());
    assert!(registry.get("Study").unwrap().is_none());
    assert!(registry.shield_for(&study(1)).unwrap_err().is_configuration());
    assert_eq!(held.model_name(), "Study");
}
