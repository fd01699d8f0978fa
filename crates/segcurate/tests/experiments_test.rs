//! Integration tests for experiment discovery and training metrics.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use segcurate::{
    Event, EventKind, ExperimentsModel, ExperimentsResolver, FnSubscriber, UserSettings,
    training_progress,
};

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn model(root: &Path) -> ExperimentsModel {
    ExperimentsModel::new(UserSettings::new(root)).unwrap()
}

#[test]
fn test_refresh_lists_visible_directories() {
    let root = TempDir::new().unwrap();
    for name in ["exp_b", "exp_a", ".cache"] {
        fs::create_dir(root.path().join(name)).unwrap();
    }
    touch(&root.path().join("notes.txt"));

    let model = model(root.path());
    assert_eq!(model.experiments(), vec!["exp_a", "exp_b"]);

    fs::create_dir(root.path().join("exp_c")).unwrap();
    assert_eq!(model.experiments().len(), 2);
    model.refresh_experiments().unwrap();
    assert_eq!(model.experiments().len(), 3);
}

#[test]
fn test_select_experiment_emits_event() {
    let root = TempDir::new().unwrap();
    let model = model(root.path());

    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let listener = FnSubscriber::new(move |event: &Event| {
        assert_eq!(*event, Event::ExperimentSelected);
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let _sub = model
        .publisher()
        .subscribe(EventKind::ExperimentSelected, &listener, None);

    model.set_experiment_name(Some("exp1".to_string())).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(model.experiment_path().unwrap(), root.path().join("exp1"));
    assert_eq!(model.csv_path(), Some(root.path().join("exp1").join("data")));
}

#[test]
fn test_paths_under_experiment() {
    let root = TempDir::new().unwrap();
    let model = model(root.path());

    assert_eq!(
        model.model_test_images_path("exp1"),
        Some(root.path().join("exp1").join("test_images"))
    );
    assert_eq!(
        model.train_config_path("exp1"),
        Some(root.path().join("exp1").join("train_config.yaml"))
    );
    assert_eq!(model.model_test_images_path(""), None);
}

#[test]
fn test_latest_metrics_version() {
    let root = TempDir::new().unwrap();
    let model = model(root.path());
    model.set_experiment_name(Some("exp1".to_string())).unwrap();

    assert_eq!(model.latest_metrics_csv_version().unwrap(), -1);
    assert_eq!(model.latest_metrics_csv().unwrap(), None);

    let csv = root.path().join("exp1").join("csv");
    for name in ["version_0", "version_2", "version_10", "other"] {
        fs::create_dir_all(csv.join(name)).unwrap();
    }
    assert_eq!(model.latest_metrics_csv_version().unwrap(), 10);
    assert_eq!(
        model.latest_metrics_csv().unwrap(),
        Some(csv.join("version_10").join("metrics.csv"))
    );
}

#[test]
fn test_best_checkpoint_skips_last() {
    let root = TempDir::new().unwrap();
    let checkpoints = root.path().join("exp1").join("checkpoints");
    touch(&checkpoints.join("epoch_001.ckpt"));
    thread::sleep(Duration::from_millis(20));
    touch(&checkpoints.join("epoch_004.ckpt"));
    thread::sleep(Duration::from_millis(20));
    touch(&checkpoints.join("last.ckpt"));

    let model = model(root.path());
    assert_eq!(
        model.best_checkpoint("exp1").unwrap(),
        Some("epoch_004.ckpt".to_string())
    );
    assert_eq!(model.best_checkpoint("missing").unwrap(), None);

    model.set_experiment_name(Some("exp1".to_string())).unwrap();
    assert_eq!(model.current_epoch().unwrap(), Some(4));
}

#[test]
fn test_training_progress_from_latest_metrics() {
    let root = TempDir::new().unwrap();
    let model = model(root.path());
    model.set_experiment_name(Some("exp1".to_string())).unwrap();

    let metrics = root
        .path()
        .join("exp1")
        .join("csv")
        .join("version_0")
        .join("metrics.csv");
    touch(&metrics);
    fs::write(&metrics, "epoch,step,val_loss\n0,1,0.5\n1,2,0.4\n1,3,0.3\n2,4,0.2\n").unwrap();

    let path = model.latest_metrics_csv().unwrap().unwrap();
    assert_eq!(training_progress(&path).unwrap(), 2);
}
