use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use spillway::{Bucket, BucketConfig, BucketError, FileStorage, ManualClock, Mark, PourOutcome, StorageBackend};
use tempfile::TempDir;

const T0: f64 = 1_377_900_000.0;

fn file_bucket(dir: &TempDir, config: BucketConfig, clock: &ManualClock) -> Bucket {
    Bucket::with_storage(config, Arc::new(FileStorage::new(dir.path())))
        .unwrap()
        .with_clock(clock.clone())
}

fn mark_files(dir: &TempDir) -> Vec<String> {
    fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| !name.ends_with(".lock"))
        .collect()
}

#[test]
fn test_start_writes_record_file() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0 + 0.25);
    let config = BucketConfig::new("testName").with_prefix("FileStorageTest");
    let mut bucket = file_bucket(&temp_dir, config, &clock);
    bucket.start().unwrap();

    let mut files: Vec<_> = fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    files.sort();
    assert_eq!(files, ["FileStorageTest_testName", "FileStorageTest_testName.lock"]);

    let contents = fs::read_to_string(temp_dir.path().join("FileStorageTest_testName")).unwrap();
    assert_eq!(contents, "1377900000.25:0");
}

#[test]
fn test_state_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let config = BucketConfig::new("jobs").with_capacity(10.0).with_rate(1.0).with_fill(10.0);

    let mut bucket = file_bucket(&temp_dir, config.clone(), &clock);
    bucket.start().unwrap();
    assert!(bucket.pour(8.0).unwrap().is_poured());
    drop(bucket);

    clock.advance(1.0);
    let mut restarted = file_bucket(&temp_dir, config, &clock);
    restarted.start().unwrap();
    assert_eq!(restarted.fill(), 3.0);
    assert!(!restarted.pour(4.0).unwrap().is_poured());
}

#[test]
fn test_refill_drain_reject_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let config = BucketConfig::new("scenario").with_capacity(10.0).with_rate(1.0);
    let mut bucket = file_bucket(&temp_dir, config, &clock);
    bucket.start().unwrap();

    clock.set(T0 + 5.0);
    assert_eq!(bucket.pour(0.0).unwrap(), PourOutcome::Poured { remaining: 5.0 });
    assert_eq!(bucket.pour(3.0).unwrap(), PourOutcome::Poured { remaining: 2.0 });

    let path = temp_dir.path().join("LeakyBucket_scenario");
    let before = fs::read(&path).unwrap();
    assert_eq!(before, b"1377900005:2");

    clock.set(T0 + 10.0);
    let outcome = bucket.pour(10.0).unwrap();
    assert!(matches!(outcome, PourOutcome::Insufficient { available, .. } if available == 7.0));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_concurrent_start_creates_one_mark() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let config = BucketConfig::new("race").with_fill(f64::from(i));
            let mut bucket = file_bucket(&temp_dir, config, &clock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                bucket.start().map(|()| bucket.fill())
            })
        })
        .collect();
    let fills: Vec<f64> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();

    // Every starter adopted the single mark written by whoever won.
    let stored = FileStorage::new(temp_dir.path()).read("LeakyBucket_race").unwrap().unwrap();
    assert!(fills.iter().all(|fill| *fill == stored.fill));
    assert_eq!(mark_files(&temp_dir), ["LeakyBucket_race"]);
}

#[test]
fn test_concurrent_pours_across_storage_handles() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let config = BucketConfig::new("shared").with_capacity(40.0).with_rate(0.0).with_fill(40.0);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mut bucket = file_bucket(&temp_dir, config.clone(), &clock);
            thread::spawn(move || {
                bucket.start().unwrap();
                (0..20).filter(|_| bucket.pour_one().unwrap().is_poured()).count()
            })
        })
        .collect();
    let poured: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(poured, 40);
    let stored = FileStorage::new(temp_dir.path()).read("LeakyBucket_shared").unwrap();
    assert_eq!(stored, Some(Mark::new(T0, 0.0)));
}

#[test]
fn test_corrupt_record_surfaces_format_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("LeakyBucket_broken"), "12:3:4").unwrap();
    let clock = ManualClock::new(T0);
    let mut bucket = file_bucket(&temp_dir, BucketConfig::new("broken"), &clock);

    let err = bucket.start().unwrap_err();
    assert!(matches!(err, BucketError::Format { .. }), "{err:?}");
    assert!(!bucket.is_started());
}

#[test]
fn test_blank_record_surfaces_format_error() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("LeakyBucket_blank"), "   \n").unwrap();
    let clock = ManualClock::new(T0);
    let mut bucket = file_bucket(&temp_dir, BucketConfig::new("blank"), &clock);

    let err = bucket.start().unwrap_err();
    assert!(matches!(err, BucketError::Format { .. }), "{err:?}");
    assert_eq!(fs::read_to_string(temp_dir.path().join("LeakyBucket_blank")).unwrap(), "   \n");
}

#[test]
fn test_stored_fill_never_exceeds_capacity() {
    let temp_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(T0);
    let capacity = 0.6666667;
    let config = BucketConfig::new("thirds").with_capacity(capacity).with_fill(capacity);
    let mut bucket = file_bucket(&temp_dir, config, &clock);
    bucket.start().unwrap();

    let stored = FileStorage::new(temp_dir.path()).read("LeakyBucket_thirds").unwrap().unwrap();
    assert_eq!(stored.fill, capacity);
    assert!(bucket.pour(capacity).unwrap().is_poured());
}

#[test]
fn test_unusable_directory_is_permission_error() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("not-a-dir");
    fs::write(&blocker, b"").unwrap();
    let mut bucket = Bucket::with_storage(BucketConfig::default(), Arc::new(FileStorage::new(blocker.join("buckets"))))
        .unwrap()
        .with_clock(ManualClock::new(T0));

    let err = bucket.start().unwrap_err();
    assert!(matches!(err, BucketError::Permission { .. }), "{err:?}");
    assert!(!bucket.is_started());
    assert_eq!(bucket.last_timestamp(), None);
    assert_eq!(bucket.fill(), 0.0);
}

#[cfg(unix)]
#[test]
fn test_read_only_directory_is_permission_error() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("notWritable");
    fs::create_dir(&path).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o555)).unwrap();

    // Privileged users write through mode bits; nothing to check then.
    if fs::write(path.join("probe"), b"").is_ok() {
        return;
    }

    let mut bucket = Bucket::with_storage(BucketConfig::default(), Arc::new(FileStorage::new(&path)))
        .unwrap()
        .with_clock(ManualClock::new(T0));
    let err = bucket.start().unwrap_err();
    assert!(matches!(err, BucketError::Permission { .. }), "{err:?}");
    assert!(!bucket.is_started());
    assert_eq!(bucket.last_timestamp(), None);

    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}
