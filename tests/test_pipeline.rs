mod common;
use common::{alternating, small_config, write_subject};
use eeg_cnn::{
    build_dataset, permutation, prepare_subject, prepare_subjects, run_cross_validation, FoldReport,
    LabelKind, TrainingConfig,
};

use burn::backend::{Autodiff, NdArray};
use burn::config::Config;

type TestBackend = Autodiff<NdArray<f32>>;

#[test]
fn prepared_subject_is_permuted_with_load_seed() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = small_config();
    let (classes, amp) = alternating(12, 0.0);
    let path = write_subject(dir.path(), "sub1.mat", &classes, &amp, true);

    let subject = prepare_subject(&path, &cfg).unwrap();
    let cols = 4 * cfg.spectrogram.n_freq * cfg.spectrogram.n_time;
    assert_eq!(subject.features.dim(), (12, cols));

    let perm = permutation(12, cfg.load_seed);
    let tracked = &subject.labels[&LabelKind::Pmb28];
    let class = &subject.labels[&LabelKind::MaxRel];
    for (row, &orig) in perm.iter().enumerate() {
        assert_eq!(tracked[row], orig as f64);
        assert_eq!(class[row], classes[orig]);
    }

    let again = prepare_subject(&path, &cfg).unwrap();
    assert_eq!(subject, again);
}

#[test]
fn subjects_pool_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = small_config();
    let (c1, a1) = alternating(6, 0.0);
    let (c2, a2) = alternating(4, 1.0);
    let p1 = write_subject(dir.path(), "sub1.mat", &c1, &a1, false);
    let p2 = write_subject(dir.path(), "sub2.mat", &c2, &a2, false);

    let pooled = prepare_subjects(&[&p1, &p2], &cfg).unwrap();
    let first = prepare_subject(&p1, &cfg).unwrap();
    assert_eq!(pooled.len(), 10);
    assert_eq!(
        pooled.features.row(3),
        first.features.row(3),
    );
}

#[test]
fn dataset_is_filtered_balanced_and_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = small_config();
    // 9 class-0 and 5 class-1 trials; trial 0 is a huge-amplitude outlier
    let classes: Vec<f64> = (0..14).map(|i| if i < 9 { 0.0 } else { 1.0 }).collect();
    let mut amp = vec![1.0_f32; 14];
    amp[0] = 1000.0;
    let path = write_subject(dir.path(), "sub1.mat", &classes, &amp, true);

    let subject = prepare_subject(&path, &cfg).unwrap();
    let ds = build_dataset(&subject, &cfg).unwrap();
    assert_eq!(ds.count_label(0.0), 5);
    assert_eq!(ds.count_label(1.0), 5);
    assert_eq!(ds.len(), 10);

    let again = build_dataset(&subject, &cfg).unwrap();
    assert_eq!(ds, again);

    // the outlier row never survives
    let max = ds.features.iter().copied().fold(f32::MIN, f32::max);
    assert!(max < 10.0, "outlier kept: max feature {max}");
}

#[test]
fn missing_label_kind_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = small_config();
    cfg.label = LabelKind::Act;
    let (classes, amp) = alternating(6, 0.0);
    let path = write_subject(dir.path(), "sub1.mat", &classes, &amp, false);
    let subject = prepare_subject(&path, &cfg).unwrap();
    let err = format!("{:#}", build_dataset(&subject, &cfg).unwrap_err());
    assert!(err.contains("lb_act"), "{err}");
}

#[test]
fn cross_validation_writes_fold_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = small_config();
    let (classes, amp) = alternating(12, 0.0);
    let path = write_subject(dir.path(), "sub1.mat", &classes, &amp, false);
    let ds = build_dataset(&prepare_subject(&path, &cfg).unwrap(), &cfg).unwrap();

    let out = dir.path().join("logs");
    let device = Default::default();
    let reports = run_cross_validation::<TestBackend>(&ds, &cfg, &out, &device).unwrap();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports.iter().map(|r| r.test_size).sum::<usize>(), ds.len());

    let saved = TrainingConfig::load(out.join("config.json")).unwrap();
    assert_eq!(saved.num_epochs, 2);
    assert_eq!(saved.model.height, 8);

    for n in 1..=3 {
        let hist = out.join(format!("cv{n}")).join("history.json");
        let report: FoldReport = serde_json::from_reader(std::fs::File::open(&hist).unwrap()).unwrap();
        assert_eq!(report.fold, n);
        assert_eq!(report.epochs.len(), 2);
        assert!(report.test_accuracy.is_some());
    }
}

#[test]
fn holdout_replaces_folds() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = small_config();
    cfg.holdout = Some(0.75);
    cfg.training.num_epochs = 1;
    let (classes, amp) = alternating(8, 1.0);
    let path = write_subject(dir.path(), "sub1.mat", &classes, &amp, true);
    let ds = build_dataset(&prepare_subject(&path, &cfg).unwrap(), &cfg).unwrap();

    let out = dir.path().join("holdout");
    let device = Default::default();
    let reports = run_cross_validation::<TestBackend>(&ds, &cfg, &out, &device).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!((reports[0].train_size, reports[0].test_size), (6, 2));
    assert!(out.join("cv1").join("history.json").exists());
    assert!(!out.join("cv2").exists());
}
