use livedoc::{Collection, Collections, Criteria, Model, Settings, StoreError};
use serde::{Deserialize, Serialize};

use crate::support::Task;

#[test]
fn derive_supplies_collection_and_id() {
    let task = Task::new("t1", "write", "open");
    assert_eq!(Task::COLLECTION, "tasks");
    assert_eq!(task.id(), "t1");
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, livedoc::Model)]
struct UserProfile {
    #[model(id)]
    handle: String,
    bio: String,
}

#[test]
fn derive_defaults_collection_name_and_honours_id_attribute() {
    let profile = UserProfile {
        handle: "ann".into(),
        bio: "hi".into(),
    };
    assert_eq!(UserProfile::COLLECTION, "user_profiles");
    assert_eq!(profile.id(), "ann");
}

#[test]
fn typed_crud() {
    let registry = Collections::new();
    let tasks = registry.collection::<Task>(Settings::new().index("status")).unwrap();
    let models = tasks.models::<Task>();

    models.insert(&Task::new("t1", "write", "open").priority(2)).unwrap();
    models.insert(&Task::new("t2", "review", "open")).unwrap();
    models.insert(&Task::new("t3", "ship", "done")).unwrap();

    let duplicate = models.insert(&Task::new("t1", "again", "open")).unwrap_err();
    assert_eq!(duplicate, StoreError::DuplicateDocument { id: "t1".into() });

    let open = models.find(&Criteria::eq("status", "open")).unwrap();
    assert_eq!(open.len(), 2);

    let updated = models.update(&Task::new("t2", "review", "done")).unwrap();
    assert_eq!(updated.status, "done");
    assert_eq!(models.count(&Criteria::eq("status", "done")).unwrap(), 2);

    let top = models
        .find_one(&Criteria::new(serde_json::json!({"priority": {"$gt": 1}})).unwrap())
        .unwrap();
    assert_eq!(top.map(|t| t.id), Some("t1".to_string()));

    models.delete("t3").unwrap();
    assert!(models.find_by_id("t3").unwrap().is_none());
}

#[test]
fn upsert_through_models_keeps_untouched_fields() {
    let tasks = Collection::new("tasks", Settings::new());
    let models = tasks.models::<Task>();

    models.upsert(&Task::new("t1", "write", "open").priority(5)).unwrap();
    let merged = models.upsert(&Task::new("t1", "write", "done").priority(5)).unwrap();

    assert_eq!(merged, Task::new("t1", "write", "done").priority(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_mutators_run_inside_a_runtime() {
    let tasks = Collection::new(Task::COLLECTION, Settings::new());
    let models = tasks.models::<Task>();

    models.insert_async(&Task::new("t1", "write", "open")).await.unwrap();
    models
        .upsert_async(&Task::new("t1", "write", "done"))
        .await
        .unwrap();
    let updated = models
        .update_async(&Task::new("t1", "rewrite", "done"))
        .await
        .unwrap();
    assert_eq!(updated, Task::new("t1", "rewrite", "done"));
    assert_eq!(models.count(&Criteria::eq("status", "done")).unwrap(), 1);

    models.delete_async("t1").await.unwrap();
    assert_eq!(models.find_by_id("t1").unwrap(), None);
}
