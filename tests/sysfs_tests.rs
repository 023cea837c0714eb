#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use pi_gpio::{Direction, GpioConfig, GpioError, GpioManager, PinOptions, Pull, SysfsBackend};

// Stands in for gpio-admin: creates and removes gpio<line> directories under
// the root passed as its first argument and logs every call.
const FAKE_HELPER: &str = r#"
root="$1"
cmd="$2"
line="$3"
echo "$cmd $line${4:+ $4}" >> "$root/calls.log"
if [ "$line" = "25" ]; then
    echo "gpio-admin: line $line is reserved" >&2
    exit 1
fi
case "$cmd" in
    export)
        mkdir -p "$root/gpio$line"
        printf in > "$root/gpio$line/direction"
        printf 0 > "$root/gpio$line/value"
        ;;
    unexport)
        rm -rf "$root/gpio$line"
        ;;
    *)
        echo "usage: gpio-admin export|unexport <line> [pull]" >&2
        exit 2
        ;;
esac
"#;

fn sysfs_manager(root: &Path) -> GpioManager<SysfsBackend> {
    let script = root.join("gpio-admin.sh");
    fs::write(&script, FAKE_HELPER).expect("write helper");

    let config = GpioConfig {
        helper: "sh".to_string(),
        helper_args: vec![
            script.to_string_lossy().into_owned(),
            root.to_string_lossy().into_owned(),
        ],
        gpio_root: root.to_path_buf(),
        cmdline_path: root.join("cmdline"),
        ..GpioConfig::default()
    };
    let backend = Arc::new(SysfsBackend::new(&config));
    GpioManager::new(config, backend)
}

fn helper_calls(root: &Path) -> Vec<String> {
    fs::read_to_string(root.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn full_lifecycle_against_control_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manager = sysfs_manager(temp.path());

    manager.open(11, PinOptions::output()).await.unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("gpio17/direction")).unwrap(),
        "out"
    );

    manager.write(11, true).await.unwrap();
    assert_eq!(
        fs::read_to_string(temp.path().join("gpio17/value")).unwrap(),
        "1"
    );
    assert_eq!(manager.read(11).await.unwrap().value(), Some(1));
    assert_eq!(manager.get_direction(11).await.unwrap(), Direction::Out);

    manager.close(11).await.unwrap();
    assert!(!temp.path().join("gpio17").exists());
    assert_eq!(helper_calls(temp.path()), vec!["export 17", "unexport 17"]);
}

#[tokio::test]
async fn pull_mode_is_passed_to_helper() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manager = sysfs_manager(temp.path());

    manager.open(7, PinOptions::input(Pull::PullDown)).await.unwrap();

    assert_eq!(helper_calls(temp.path()), vec!["export 4 pulldown"]);
    assert_eq!(manager.get_direction(7).await.unwrap(), Direction::In);
}

#[tokio::test]
async fn helper_stderr_is_surfaced() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manager = sysfs_manager(temp.path());

    let err = manager.open(22, PinOptions::output()).await.unwrap_err();

    match err {
        GpioError::ExportFailed { line, stderr } => {
            assert_eq!(line, 25);
            assert_eq!(stderr, "gpio-admin: line 25 is reserved");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(manager.used_pins().is_empty());

    let err = manager.close(22).await.unwrap_err();
    assert!(matches!(err, GpioError::UnexportFailed { line: 25, .. }));
}

#[tokio::test]
async fn missing_helper_is_export_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = GpioConfig {
        helper: temp
            .path()
            .join("no-such-helper")
            .to_string_lossy()
            .into_owned(),
        gpio_root: temp.path().to_path_buf(),
        ..GpioConfig::default()
    };
    let manager = GpioManager::new(config.clone(), Arc::new(SysfsBackend::new(&config)));

    let err = manager.open(3, PinOptions::output()).await.unwrap_err();

    assert!(matches!(err, GpioError::ExportFailed { line: 0, .. }));
}

#[tokio::test]
async fn value_file_missing_is_io_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let manager = sysfs_manager(temp.path());

    let err = manager.read(12).await.unwrap_err();

    match err {
        GpioError::Io { path, source } => {
            assert_eq!(path, temp.path().join("gpio18/value"));
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other}"),
    }
}
