use campusdb::registry::{College, Student};
use campusdb::{CollegeId, DurabilityMode, StoreConfig, StudentId};
use tempfile::TempDir;

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::persistent(dir.path()).durability(DurabilityMode::Sync)
}

fn tech() -> College {
    College {
        id: CollegeId(1),
        name: "Tech".into(),
        fees: 1000,
    }
}

fn amy() -> Student {
    Student {
        id: StudentId(10),
        name: "Amy".into(),
        age: 20,
        college_choice: Some(CollegeId(1)),
    }
}

#[tokio::test]
async fn test_committed_work_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut s = campusdb::open_session(&config(&dir)).await.unwrap();
        s.add_college(&tech()).await.unwrap();
        s.add_student(&amy()).await.unwrap();
        s.commit().await.unwrap();

        let mut bob = amy();
        bob.id = StudentId(11);
        bob.name = "Bob".into();
        s.add_student(&bob).await.unwrap();
        s.finish().await.unwrap();
    }

    let s = campusdb::open_session(&config(&dir)).await.unwrap();
    assert_eq!(s.list_colleges().await.unwrap(), vec![tech()]);
    assert_eq!(s.list_students().await.unwrap(), vec![amy()]);
}

#[tokio::test]
async fn test_abandoned_transaction_is_not_recovered() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut s = campusdb::open_session(&config(&dir)).await.unwrap();
        s.add_college(&tech()).await.unwrap();
        s.commit().await.unwrap();
        s.add_student(&amy()).await.unwrap();
        // dropped without finish or commit
    }

    let s = campusdb::open_session(&config(&dir)).await.unwrap();
    assert_eq!(s.list_colleges().await.unwrap().len(), 1);
    assert!(s.list_students().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recovery_after_checkpoint_and_cascade() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir).checkpoint_threshold(1);
    {
        let mut s = campusdb::open_session(&cfg).await.unwrap();
        s.add_college(&tech()).await.unwrap();
        s.add_student(&amy()).await.unwrap();
        s.commit().await.unwrap();

        s.delete_college(CollegeId(1)).await.unwrap();
        s.commit().await.unwrap();
        s.finish().await.unwrap();
    }

    let s = campusdb::open_session(&cfg).await.unwrap();
    assert!(s.list_colleges().await.unwrap().is_empty());
    let students = s.list_students().await.unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].college_choice, None);
}

#[tokio::test]
async fn test_url_config_opens_same_store() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("campusdb://{}?durability=sync", dir.path().display());
    let cfg = StoreConfig::from_url(&url).unwrap();
    assert_eq!(cfg.data_dir.as_deref(), Some(dir.path()));
    {
        let mut s = campusdb::open_session(&cfg).await.unwrap();
        s.add_college(&tech()).await.unwrap();
        s.commit().await.unwrap();
        s.finish().await.unwrap();
    }

    let s = campusdb::open_session(&config(&dir)).await.unwrap();
    assert_eq!(s.list_colleges().await.unwrap().len(), 1);
}
